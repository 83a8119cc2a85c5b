//! Conversation message entries.

use serde::{Deserialize, Serialize};

use crate::tool::ToolCall;

/// A single entry in a conversation's message history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatMessage {
    /// Text typed by the human.
    User {
        /// The utterance.
        content: String,
    },
    /// Text produced by the assistant, optionally requesting one tool call.
    Assistant {
        /// User-facing text (may be empty when only a tool call was emitted).
        content: String,
        /// The tool call honoured for this response, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_call: Option<ToolCall>,
    },
    /// The response to an assistant tool call.
    Tool {
        /// The `call_id` of the [`ToolCall`] being answered.
        call_id: String,
        /// Serialized tool output.
        content: String,
    },
}

impl ChatMessage {
    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Creates an assistant message without a tool call.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_call: None,
        }
    }

    /// Creates an assistant message that requests a tool call.
    #[must_use]
    pub fn assistant_with_tool(content: impl Into<String>, tool_call: ToolCall) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_call: Some(tool_call),
        }
    }

    /// Creates a tool response message.
    #[must_use]
    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            call_id: call_id.into(),
            content: content.into(),
        }
    }

    /// Role name as stored in checkpoints and shown in transcripts.
    #[must_use]
    pub const fn role(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::Tool { .. } => "tool",
        }
    }

    /// Text content of the message.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::User { content }
            | Self::Assistant { content, .. }
            | Self::Tool { content, .. } => content,
        }
    }

    /// The tool call carried by an assistant message.
    #[must_use]
    pub const fn tool_call(&self) -> Option<&ToolCall> {
        match self {
            Self::Assistant { tool_call, .. } => tool_call.as_ref(),
            _ => None,
        }
    }

    /// Whether this message was authored by the assistant.
    #[must_use]
    pub const fn is_assistant(&self) -> bool {
        matches!(self, Self::Assistant { .. })
    }
}
