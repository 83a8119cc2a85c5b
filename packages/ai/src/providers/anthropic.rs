//! Anthropic Messages API provider.

use serde::{Deserialize, Serialize};
use space_agent_models::ChatMessage;

use super::{ContentBlock, LlmProvider, LlmResponse, StopReason, tool_call_arguments};
use crate::AiError;

/// Client for the Anthropic Messages API.
pub struct AnthropicProvider {
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Provider for `model`, authenticated with `api_key`.
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            temperature: super::openai::DEFAULT_TEMPERATURE,
            client: reqwest::Client::new(),
        }
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Messages API endpoint.
const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

const API_VERSION: &str = "2023-06-01";

const MAX_TOKENS: u32 = 4096;

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Turn>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct Turn {
    role: &'static str,
    content: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Converts the history to Messages API turns.
///
/// Tool responses travel as `tool_result` blocks in a user turn, and
/// consecutive turns with the same role are merged because the API requires
/// strict alternation.
fn to_api_messages(messages: &[ChatMessage]) -> Vec<Turn> {
    let mut turns: Vec<Turn> = Vec::new();

    for msg in messages {
        let (role, blocks) = match msg {
            ChatMessage::User { content } => (
                "user",
                vec![serde_json::json!({ "type": "text", "text": content })],
            ),
            ChatMessage::Assistant { content, tool_call } => {
                let mut blocks = Vec::new();
                if !content.is_empty() {
                    blocks.push(serde_json::json!({ "type": "text", "text": content }));
                }
                if let Some(call) = tool_call {
                    blocks.push(serde_json::json!({
                        "type": "tool_use",
                        "id": call.call_id,
                        "name": call.kind().as_ref(),
                        "input": tool_call_arguments(call),
                    }));
                }
                ("assistant", blocks)
            }
            ChatMessage::Tool { call_id, content } => (
                "user",
                vec![serde_json::json!({
                    "type": "tool_result",
                    "tool_use_id": call_id,
                    "content": content,
                })],
            ),
        };

        if blocks.is_empty() {
            continue;
        }

        match turns.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => turns.push(Turn {
                role,
                content: blocks,
            }),
        }
    }

    turns
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        tools: &[serde_json::Value],
    ) -> Result<LlmResponse, AiError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: self.temperature,
            system: system_prompt,
            messages: to_api_messages(messages),
            tools: tools.iter().map(tool_schema).collect(),
        };

        let resp = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map_or_else(|_| format!("HTTP {status}: {body}"), |e| e.error.message);
            return Err(AiError::Provider { message });
        }

        let response: MessagesResponse = serde_json::from_str(&body)?;
        Ok(into_response(response))
    }
}

/// Tool schemas use `input_schema` where the registry says `parameters`.
fn tool_schema(tool: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "name": tool["name"],
        "description": tool["description"],
        "input_schema": tool["parameters"],
    })
}

fn into_response(response: MessagesResponse) -> LlmResponse {
    let content = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ResponseBlock::Text { text } => Some(ContentBlock::Text { text }),
            ResponseBlock::ToolUse { id, name, input } => Some(ContentBlock::ToolUse {
                id,
                name,
                arguments: input.to_string(),
            }),
            ResponseBlock::Other => None,
        })
        .collect();

    let stop_reason = match response.stop_reason.as_deref() {
        Some("tool_use") => StopReason::ToolUse,
        Some("max_tokens") => StopReason::MaxTokens,
        _ => StopReason::EndTurn,
    };

    LlmResponse {
        content,
        stop_reason,
    }
}
