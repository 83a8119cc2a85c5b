//! Agent node: one LLM call per visit.

use space_agent_ai::LlmProvider;
use space_agent_models::{
    ChatMessage, ConversationState, PendingTool, StateUpdate, ToolCall, ToolParseError,
};

use crate::registry::ToolRegistry;

/// Appended when the LLM call fails or its tool call cannot be parsed.
pub const APOLOGY: &str = "抱歉，处理您的请求时遇到问题。";

/// Used when the model answers with neither text nor a usable tool call.
pub const EMPTY_REPLY_FALLBACK: &str = "抱歉，我没有理解您的意思，请再详细描述一下您的需求。";

/// Runs the agent node.
///
/// Never fails: provider errors and malformed tool calls become an apology
/// that completes the turn.
pub async fn run(
    state: &ConversationState,
    provider: &dyn LlmProvider,
    registry: &ToolRegistry,
    system_prompt: &str,
) -> StateUpdate {
    log::debug!("agent: thread={} messages={}", state.thread_id, state.messages.len());

    let mut update = StateUpdate::new();
    let mut history = state.messages.clone();

    if let Some(input) = state.user_input.as_deref().map(str::trim)
        && !input.is_empty()
    {
        let message = ChatMessage::user(input);
        history.push(message.clone());
        update = update.message(message);
    }
    update = update.user_input(None);

    let response = match provider
        .chat(system_prompt, &history, &registry.definitions())
        .await
    {
        Ok(response) => response,
        Err(e) => {
            log::error!("agent: LLM call failed for thread {}: {e}", state.thread_id);
            return update
                .message(ChatMessage::assistant(APOLOGY))
                .pending_tool(None)
                .completed(true);
        }
    };

    let text = response.text();
    let tool_uses = response.tool_uses();

    if state.completed {
        if !tool_uses.is_empty() {
            log::warn!(
                "agent: ignoring {} tool call(s) after the turn completed",
                tool_uses.len()
            );
        }
        if !text.trim().is_empty() {
            update = update.message(ChatMessage::assistant(text));
        }
        return update.pending_tool(None);
    }

    let Some(&(call_id, name, arguments)) = tool_uses.first() else {
        return update
            .message(ChatMessage::assistant(text_or_fallback(text)))
            .pending_tool(None);
    };

    if tool_uses.len() > 1 {
        log::warn!(
            "agent: model requested {} tool calls; only {name} is honoured",
            tool_uses.len()
        );
    }

    match ToolCall::parse(call_id, name, arguments) {
        Ok(call) if registry.contains(call.kind()) => {
            log::info!("agent: tool call {name} ({call_id})");
            let pending = PendingTool::from(&call);
            update
                .message(ChatMessage::assistant_with_tool(text, call))
                .pending_tool(Some(pending))
        }
        Ok(call) => {
            log::warn!("agent: tool {} is not registered", call.kind());
            update
                .message(ChatMessage::assistant(text_or_fallback(text)))
                .pending_tool(None)
        }
        Err(ToolParseError::UnknownTool { name }) => {
            log::warn!("agent: unknown tool {name}");
            update
                .message(ChatMessage::assistant(text_or_fallback(text)))
                .pending_tool(None)
        }
        Err(e @ ToolParseError::MalformedArguments { .. }) => {
            log::warn!("agent: {e}");
            update
                .message(ChatMessage::assistant(APOLOGY))
                .pending_tool(None)
                .completed(true)
        }
    }
}

fn text_or_fallback(text: String) -> String {
    if text.trim().is_empty() {
        EMPTY_REPLY_FALLBACK.to_string()
    } else {
        text
    }
}
