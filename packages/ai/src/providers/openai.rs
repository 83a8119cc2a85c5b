//! `OpenAI`-compatible chat completions provider.

use serde::{Deserialize, Serialize};
use space_agent_models::ChatMessage;

use super::{ContentBlock, LlmProvider, LlmResponse, StopReason, tool_call_arguments};
use crate::AiError;

/// Endpoint used when `AI_BASE_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Sampling temperature used when `AI_TEMPERATURE` is not set.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Client for `OpenAI` style `/chat/completions` endpoints.
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Provider for `model` on the public `OpenAI` endpoint.
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            client: reqwest::Client::new(),
        }
    }

    /// Points the provider at another `OpenAI`-compatible server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Upper bound on generated tokens per completion.
const MAX_TOKENS: u32 = 4096;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl WireMessage {
    const fn plain(role: &'static str, content: String) -> Self {
        Self {
            role,
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireToolSchema,
}

#[derive(Serialize)]
struct WireToolSchema {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&serde_json::Value> for WireTool {
    fn from(schema: &serde_json::Value) -> Self {
        let field = |key: &str| schema[key].as_str().unwrap_or_default().to_string();
        Self {
            kind: "function",
            function: WireToolSchema {
                name: field("name"),
                description: field("description"),
                parameters: schema["parameters"].clone(),
            },
        }
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn to_api_messages(system_prompt: &str, messages: &[ChatMessage]) -> Vec<WireMessage> {
    std::iter::once(WireMessage::plain("system", system_prompt.to_string()))
        .chain(messages.iter().map(|msg| match msg {
            ChatMessage::User { content } => WireMessage::plain("user", content.clone()),
            ChatMessage::Assistant { content, tool_call } => WireMessage {
                role: "assistant",
                content: Some(content.clone()).filter(|c| !c.is_empty()),
                tool_calls: tool_call.as_ref().map(|call| {
                    vec![WireToolCall {
                        id: call.call_id.clone(),
                        kind: function_kind(),
                        function: WireFunction {
                            name: call.kind().as_ref().to_string(),
                            arguments: tool_call_arguments(call).to_string(),
                        },
                    }]
                }),
                tool_call_id: None,
            },
            ChatMessage::Tool { call_id, content } => WireMessage {
                tool_call_id: Some(call_id.clone()),
                ..WireMessage::plain("tool", content.clone())
            },
        }))
        .collect()
}

/// Converts the first completion choice into an [`LlmResponse`].
fn into_response(choice: Choice) -> LlmResponse {
    let text = choice.message.content.filter(|t| !t.is_empty());
    let content: Vec<ContentBlock> = text
        .map(|text| ContentBlock::Text { text })
        .into_iter()
        .chain(
            choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|call| ContentBlock::ToolUse {
                    id: call.id,
                    name: call.function.name,
                    arguments: call.function.arguments,
                }),
        )
        .collect();

    let has_tools = content
        .iter()
        .any(|b| matches!(b, ContentBlock::ToolUse { .. }));
    let stop_reason = match choice.finish_reason.as_deref() {
        Some("length") => StopReason::MaxTokens,
        Some("tool_calls") => StopReason::ToolUse,
        _ if has_tools => StopReason::ToolUse,
        _ => StopReason::EndTurn,
    };

    LlmResponse {
        content,
        stop_reason,
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        tools: &[serde_json::Value],
    ) -> Result<LlmResponse, AiError> {
        let request = CompletionRequest {
            model: &self.model,
            messages: to_api_messages(system_prompt, messages),
            tools: tools.iter().map(WireTool::from).collect(),
            max_tokens: MAX_TOKENS,
            temperature: self.temperature,
        };

        log::debug!(
            "Sending {} messages to {} ({})",
            request.messages.len(),
            self.base_url,
            self.model
        );

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
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

        let response: CompletionResponse = serde_json::from_str(&body)?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AiError::Provider {
                message: "Completion response carried no choices".to_string(),
            })?;

        Ok(into_response(choice))
    }
}
