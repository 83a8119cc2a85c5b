//! The [`LlmProvider`] trait and its two wire implementations.

pub mod anthropic;
pub mod openai;

use space_agent_models::{ChatMessage, ToolCall};

use crate::AiError;

const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

/// A structured content block within a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    /// Text content.
    Text {
        /// The text.
        text: String,
    },
    /// A function call emitted by the model.
    ToolUse {
        /// Provider-assigned call id.
        id: String,
        /// Tool name.
        name: String,
        /// Raw JSON argument string, exactly as the model produced it.
        arguments: String,
    },
}

/// One model completion.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Text and tool blocks, in emission order.
    pub content: Vec<ContentBlock>,
    /// Reason the completion ended.
    pub stop_reason: StopReason,
}

impl LlmResponse {
    /// Concatenated text blocks.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::ToolUse { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Tool use blocks as `(id, name, arguments)`, in emission order.
    #[must_use]
    pub fn tool_uses(&self) -> Vec<(&str, &str, &str)> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse {
                    id,
                    name,
                    arguments,
                } => Some((id.as_str(), name.as_str(), arguments.as_str())),
                ContentBlock::Text { .. } => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    /// Output was truncated at the token limit.
    MaxTokens,
}

/// A chat model that can call tools.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Completes `messages` under `system_prompt`, offering `tools`.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] on transport failures, non-success HTTP
    /// statuses and undecodable bodies.
    async fn chat(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        tools: &[serde_json::Value],
    ) -> Result<LlmResponse, AiError>;
}

/// JSON arguments of a recorded tool call. Argument-less tools are
/// sent back as `{}`.
pub(crate) fn tool_call_arguments(call: &ToolCall) -> serde_json::Value {
    match call.operation.arguments() {
        serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
        other => other,
    }
}

/// Builds the provider named by `AI_PROVIDER`, or the first one whose
/// credentials are present (`ANTHROPIC_API_KEY`, then `OPENAI_API_KEY` or
/// `AI_BASE_URL`). `AI_MODEL`, `AI_BASE_URL` and `AI_TEMPERATURE` tune it.
///
/// # Errors
///
/// Returns [`AiError::Config`] if no credentials are found, the explicitly
/// requested provider is not configured, or `AI_TEMPERATURE` is not a
/// number.
pub fn create_provider_from_env() -> Result<Box<dyn LlmProvider>, AiError> {
    let provider = std::env::var("AI_PROVIDER").unwrap_or_else(|_| detect_provider());
    let temperature = match std::env::var("AI_TEMPERATURE") {
        Ok(value) => value.parse::<f32>().map_err(|_| AiError::Config {
            message: format!("AI_TEMPERATURE must be a number, got '{value}'"),
        })?,
        Err(_) => openai::DEFAULT_TEMPERATURE,
    };

    match provider.to_lowercase().as_str() {
        "anthropic" | "claude" => {
            let api_key = required_var("ANTHROPIC_API_KEY")?;
            let model = model_or(DEFAULT_ANTHROPIC_MODEL);
            log::info!("Using Anthropic provider with model {model}");
            Ok(Box::new(
                anthropic::AnthropicProvider::new(api_key, model).with_temperature(temperature),
            ))
        }
        "openai" | "gpt" => {
            // Local servers (Ollama, vLLM) accept any key.
            let api_key = std::env::var("OPENAI_API_KEY").or_else(|_| {
                if std::env::var("AI_BASE_URL").is_ok() {
                    Ok(String::new())
                } else {
                    required_var("OPENAI_API_KEY")
                }
            })?;
            let model = model_or(DEFAULT_OPENAI_MODEL);
            let base_url = std::env::var("AI_BASE_URL")
                .unwrap_or_else(|_| openai::DEFAULT_BASE_URL.to_string());
            log::info!("Using OpenAI-compatible provider at {base_url} with model {model}");
            Ok(Box::new(
                openai::OpenAiProvider::new(api_key, model)
                    .with_base_url(base_url)
                    .with_temperature(temperature),
            ))
        }
        other => Err(AiError::Config {
            message: format!("Unknown AI provider: {other}. Use 'anthropic' or 'openai'."),
        }),
    }
}

fn required_var(name: &str) -> Result<String, AiError> {
    std::env::var(name).map_err(|_| AiError::Config {
        message: format!("{name} is not set"),
    })
}

fn model_or(default: &str) -> String {
    std::env::var("AI_MODEL").unwrap_or_else(|_| default.to_string())
}

fn detect_provider() -> String {
    if std::env::var("ANTHROPIC_API_KEY").is_ok() {
        log::info!("ANTHROPIC_API_KEY found, using Anthropic");
        return "anthropic".to_string();
    }

    if std::env::var("OPENAI_API_KEY").is_ok() || std::env::var("AI_BASE_URL").is_ok() {
        log::info!("OpenAI credentials found, using OpenAI-compatible provider");
        return "openai".to_string();
    }

    log::warn!(
        "No AI credentials detected. Set one of: ANTHROPIC_API_KEY, OPENAI_API_KEY \
         or AI_BASE_URL. You can also set AI_PROVIDER explicitly."
    );

    // Falls through to a clear missing-key error
    "openai".to_string()
}
