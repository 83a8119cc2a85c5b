#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the space agent server.
//!
//! REST bodies mirror the original `/space` endpoints. WebSocket envelopes
//! are JSON objects tagged by `type`; they are kept separate from the graph
//! state types so the wire contract can evolve on its own.

use serde::{Deserialize, Serialize};

/// `GET /api/health` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Crate version.
    pub version: String,
}

/// `POST /space/invoke` body.
#[derive(Debug, Clone, Deserialize)]
pub struct InvokeRequest {
    /// The user's message.
    pub input: String,
    /// Conversation thread.
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// `POST /space/invoke` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeResponse {
    /// Final state, with `messages` reduced to the last message.
    pub output: serde_json::Value,
    /// Conversation thread.
    pub thread_id: String,
}

/// `GET /space/get_state/{thread_id}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateResponse {
    pub thread_id: String,
    pub state_exists: bool,
    /// Present only when the thread exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_values_keys: Option<Vec<String>>,
}

/// Query parameters of `GET /space/threads`.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadListParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// One entry of `GET /space/threads`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiThread {
    pub thread_id: String,
    pub title: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub message_count: i64,
}

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub detail: String,
}

/// A message received over the WebSocket.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// A chat message. Clients may omit `type` entirely.
    UserInput {
        input: Option<String>,
        thread_id: Option<String>,
    },
    /// The platform's report for a forwarded command. `payload` is the
    /// whole envelope; the graph understands both flat and nested results.
    ToolResult {
        thread_id: Option<String>,
        payload: serde_json::Value,
    },
    /// Any other tagged envelope (clients echo `tool_call` back).
    Other {
        kind: String,
    },
}

impl InboundMessage {
    /// Parses an inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if the frame is not valid JSON.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let string_field = |name: &str| {
            value
                .get(name)
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        };

        Ok(match value.get("type").and_then(serde_json::Value::as_str) {
            None | Some("user_input") => Self::UserInput {
                input: string_field("input").or_else(|| string_field("content")),
                thread_id: string_field("thread_id"),
            },
            Some("tool_result") => Self::ToolResult {
                thread_id: string_field("thread_id"),
                payload: value.clone(),
            },
            Some(other) => Self::Other {
                kind: other.to_string(),
            },
        })
    }
}

/// A message sent over the WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Assistant text.
    AiMessage { content: String, thread_id: String },
    /// A command the platform must execute and report back.
    ToolCall {
        tool_func: String,
        tool_func_args: serde_json::Value,
        thread_id: String,
    },
    /// Something went wrong.
    Error { message: String, thread_id: String },
    /// The streaming session is over.
    End { thread_id: String },
}

impl OutboundMessage {
    /// The envelope `type`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AiMessage { .. } => "ai_message",
            Self::ToolCall { .. } => "tool_call",
            Self::Error { .. } => "error",
            Self::End { .. } => "end",
        }
    }

    /// The part of the envelope that identifies a duplicate.
    #[must_use]
    pub fn content(&self) -> String {
        match self {
            Self::AiMessage { content, .. } => content.clone(),
            Self::ToolCall {
                tool_func,
                tool_func_args,
                ..
            } => serde_json::json!({ "tool_func": tool_func, "tool_func_args": tool_func_args })
                .to_string(),
            Self::Error { message, .. } => message.clone(),
            Self::End { .. } => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untyped_frame_is_user_input() {
        let parsed = InboundMessage::parse(r#"{"input": "你好", "thread_id": "t1"}"#).unwrap();
        assert_eq!(
            parsed,
            InboundMessage::UserInput {
                input: Some("你好".to_string()),
                thread_id: Some("t1".to_string()),
            }
        );
    }

    #[test]
    fn tool_result_keeps_whole_envelope() {
        let frame = r#"{"type": "tool_result", "tool_func": "create_scenario", "result": {"success": true}, "thread_id": "t1"}"#;
        let InboundMessage::ToolResult { thread_id, payload } = InboundMessage::parse(frame).unwrap()
        else {
            panic!("expected tool_result");
        };
        assert_eq!(thread_id.as_deref(), Some("t1"));
        assert_eq!(payload["result"]["success"], true);
    }

    #[test]
    fn echoed_tool_call_is_other() {
        let parsed = InboundMessage::parse(r#"{"type": "tool_call", "tool_func": "x"}"#).unwrap();
        assert_eq!(
            parsed,
            InboundMessage::Other {
                kind: "tool_call".to_string()
            }
        );
        assert!(InboundMessage::parse("not json").is_err());
    }

    #[test]
    fn outbound_is_tagged_by_type() {
        let message = OutboundMessage::ToolCall {
            tool_func: "query_scene".to_string(),
            tool_func_args: serde_json::json!({ "name": "太空任务" }),
            thread_id: "t1".to_string(),
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "tool_call");
        assert_eq!(value["tool_func_args"]["name"], "太空任务");
        assert_eq!(message.kind(), "tool_call");

        let end = serde_json::to_value(OutboundMessage::End {
            thread_id: "t1".to_string(),
        })
        .unwrap();
        assert_eq!(end, serde_json::json!({ "type": "end", "thread_id": "t1" }));
    }
}
