//! Scripted LLM provider for graph tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

use space_agent_ai::{AiError, ContentBlock, LlmProvider, LlmResponse, StopReason};
use space_agent_models::ChatMessage;

/// Replays queued responses in order, then answers "好的".
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<LlmResponse, AiError>>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<LlmResponse, AiError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Histories the provider was called with.
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat(
        &self,
        _system_prompt: &str,
        messages: &[ChatMessage],
        _tools: &[serde_json::Value],
    ) -> Result<LlmResponse, AiError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(text("好的")))
    }
}

/// Holds every call until [`GatedProvider::release`] is called, so tests can
/// observe what happens while a turn is in flight.
pub struct GatedProvider {
    inner: ScriptedProvider,
    entered: Notify,
    gate: Notify,
}

impl GatedProvider {
    pub fn new(responses: Vec<Result<LlmResponse, AiError>>) -> Self {
        Self {
            inner: ScriptedProvider::new(responses),
            entered: Notify::new(),
            gate: Notify::new(),
        }
    }

    /// Waits until a call is blocked on the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Lets one blocked call through.
    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait::async_trait]
impl LlmProvider for GatedProvider {
    async fn chat(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        tools: &[serde_json::Value],
    ) -> Result<LlmResponse, AiError> {
        self.entered.notify_one();
        self.gate.notified().await;
        self.inner.chat(system_prompt, messages, tools).await
    }
}

pub fn text(content: &str) -> LlmResponse {
    LlmResponse {
        content: vec![ContentBlock::Text {
            text: content.to_string(),
        }],
        stop_reason: StopReason::EndTurn,
    }
}

pub fn tool_use(id: &str, name: &str, arguments: &str) -> LlmResponse {
    LlmResponse {
        content: vec![ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }],
        stop_reason: StopReason::ToolUse,
    }
}
