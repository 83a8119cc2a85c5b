//! WebSocket transport at `/ws/space`.
//!
//! Each inbound `user_input` starts a turn and each `tool_result` resumes a
//! suspended one; every graph snapshot is translated into outbound
//! envelopes and the stream is closed with `end`. Outbound messages are
//! deduplicated per connection by type and content hash. The cache is reset
//! on every new user input.

use std::collections::HashSet;
use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse, web};
use actix_ws::{Closed, Message, MessageStream, Session};
use futures::StreamExt as _;
use space_agent_graph::{Snapshot, SpaceGraph};
use space_agent_models::ChatMessage;
use space_agent_server_models::{InboundMessage, OutboundMessage};

use crate::AppState;

/// Thread id reported in errors about frames that carry none.
const UNKNOWN_THREAD: &str = "unknown";

/// `GET /ws/space`
///
/// # Errors
///
/// Returns an error if the WebSocket handshake fails.
pub async fn space_socket(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, session, stream) = actix_ws::handle(&req, body)?;
    let graph = state.graph.clone();

    log::info!("WebSocket connected");
    actix_web::rt::spawn(async move {
        if serve_connection(graph, session, stream).await.is_err() {
            log::info!("WebSocket closed by peer");
        }
    });

    Ok(response)
}

async fn serve_connection(
    graph: Arc<SpaceGraph>,
    mut session: Session,
    mut stream: MessageStream,
) -> Result<(), Closed> {
    let mut outbox = Outbox::new(session.clone());

    while let Some(frame) = stream.recv().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("WebSocket protocol error: {e}");
                break;
            }
        };

        match frame {
            Message::Text(text) => handle_text(&graph, &mut outbox, &text).await?,
            Message::Ping(bytes) => session.pong(&bytes).await?,
            Message::Close(reason) => {
                log::info!("WebSocket disconnected: {reason:?}");
                return session.close(reason).await;
            }
            _ => {}
        }
    }

    session.close(None).await
}

async fn handle_text(graph: &SpaceGraph, outbox: &mut Outbox, text: &str) -> Result<(), Closed> {
    let inbound = match InboundMessage::parse(text) {
        Ok(inbound) => inbound,
        Err(e) => {
            log::warn!("Unparseable WebSocket frame: {e}");
            return outbox
                .send(error(UNKNOWN_THREAD, format!("Invalid message: {e}")))
                .await
                .map(drop);
        }
    };

    match inbound {
        InboundMessage::UserInput {
            input: Some(input),
            thread_id: Some(thread_id),
        } if !input.trim().is_empty() && !thread_id.trim().is_empty() => {
            log::info!("User input on thread {thread_id}");
            outbox.reset();
            stream_turn(graph, outbox, &thread_id, Some(input)).await
        }
        InboundMessage::UserInput { thread_id, .. } => outbox
            .send(error(
                thread_id.as_deref().unwrap_or(UNKNOWN_THREAD),
                "input and thread_id required",
            ))
            .await
            .map(drop),
        InboundMessage::ToolResult {
            thread_id: Some(thread_id),
            payload,
        } => {
            log::info!("Tool result on thread {thread_id}: {payload}");
            match graph.update_external_result(&thread_id, payload).await {
                Ok(true) => stream_turn(graph, outbox, &thread_id, None).await,
                Ok(false) => outbox
                    .send(error(&thread_id, "No command is awaiting a result on this thread"))
                    .await
                    .map(drop),
                Err(e) => {
                    log::error!("Failed to store tool result for {thread_id}: {e}");
                    outbox.send(error(&thread_id, e.to_string())).await.map(drop)
                }
            }
        }
        InboundMessage::ToolResult {
            thread_id: None, ..
        } => outbox
            .send(error(UNKNOWN_THREAD, "thread_id required"))
            .await
            .map(drop),
        InboundMessage::Other { kind } => {
            log::debug!("Ignoring inbound {kind} frame");
            Ok(())
        }
    }
}

/// Streams one turn to the client and closes it with `end`.
async fn stream_turn(
    graph: &SpaceGraph,
    outbox: &mut Outbox,
    thread_id: &str,
    input: Option<String>,
) -> Result<(), Closed> {
    let stream = graph.stream(thread_id, input);
    futures::pin_mut!(stream);

    while let Some(item) = stream.next().await {
        match item {
            Ok(snapshot) => {
                for message in snapshot_messages(&snapshot) {
                    outbox.send(message).await?;
                }
            }
            Err(e) => {
                log::error!("Graph error on thread {thread_id}: {e}");
                outbox.send(error(thread_id, e.to_string())).await?;
            }
        }
    }

    outbox
        .send(OutboundMessage::End {
            thread_id: thread_id.to_string(),
        })
        .await
        .map(drop)
}

fn error(thread_id: &str, message: impl Into<String>) -> OutboundMessage {
    OutboundMessage::Error {
        message: message.into(),
        thread_id: thread_id.to_string(),
    }
}

/// Envelopes describing a snapshot: the latest assistant text and, when
/// the thread suspended for the platform, the command to execute.
#[must_use]
pub fn snapshot_messages(snapshot: &Snapshot) -> Vec<OutboundMessage> {
    let thread_id = &snapshot.state.thread_id;
    let mut messages = Vec::new();

    if let Some(ChatMessage::Assistant { content, .. }) = snapshot.state.last_message()
        && !content.trim().is_empty()
    {
        messages.push(OutboundMessage::AiMessage {
            content: content.clone(),
            thread_id: thread_id.clone(),
        });
    }

    if let Some(command) = &snapshot.forwarded {
        messages.push(OutboundMessage::ToolCall {
            tool_func: command.func.clone(),
            tool_func_args: command.args.clone(),
            thread_id: thread_id.clone(),
        });
    }

    messages
}

/// Outbound message filter keyed by `"{type}:{md5(content)}"`.
///
/// `tool_call` and `end` are never suppressed: a command may legitimately
/// be sent twice and every stream must be terminated.
#[derive(Debug, Default)]
pub struct Dedup {
    seen: HashSet<String>,
}

impl Dedup {
    /// Cache key of a message.
    #[must_use]
    pub fn key(message: &OutboundMessage) -> String {
        format!(
            "{}:{:x}",
            message.kind(),
            md5::compute(message.content().as_bytes())
        )
    }

    /// Whether `message` should be sent, remembering it if so.
    pub fn admit(&mut self, message: &OutboundMessage) -> bool {
        match message {
            OutboundMessage::ToolCall { .. } | OutboundMessage::End { .. } => true,
            _ => self.seen.insert(Self::key(message)),
        }
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

struct Outbox {
    session: Session,
    dedup: Dedup,
}

impl Outbox {
    fn new(session: Session) -> Self {
        Self {
            session,
            dedup: Dedup::default(),
        }
    }

    fn reset(&mut self) {
        self.dedup.clear();
    }

    /// Sends `message` unless it duplicates an earlier one. Returns whether
    /// it was sent.
    async fn send(&mut self, message: OutboundMessage) -> Result<bool, Closed> {
        if !self.dedup.admit(&message) {
            log::debug!("Skipping duplicate {} message", message.kind());
            return Ok(false);
        }

        match serde_json::to_string(&message) {
            Ok(text) => {
                self.session.text(text).await?;
                Ok(true)
            }
            Err(e) => {
                log::error!("Failed to serialize {} message: {e}", message.kind());
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use space_agent_models::{CommandDescriptor, ConversationState, ToolOperation};

    use super::*;

    fn ai(content: &str) -> OutboundMessage {
        OutboundMessage::AiMessage {
            content: content.to_string(),
            thread_id: "t1".to_string(),
        }
    }

    #[test]
    fn duplicates_are_dropped_until_cleared() {
        let mut dedup = Dedup::default();

        assert!(dedup.admit(&ai("您好")));
        assert!(!dedup.admit(&ai("您好")));
        assert!(dedup.admit(&ai("再见")));

        dedup.clear();
        assert!(dedup.admit(&ai("您好")));
    }

    #[test]
    fn tool_calls_and_end_are_never_cached() {
        let mut dedup = Dedup::default();
        let call = OutboundMessage::ToolCall {
            tool_func: "clear_scene".to_string(),
            tool_func_args: serde_json::Value::Null,
            thread_id: "t1".to_string(),
        };
        let end = OutboundMessage::End {
            thread_id: "t1".to_string(),
        };

        assert!(dedup.admit(&call));
        assert!(dedup.admit(&call));
        assert!(dedup.admit(&end));
        assert!(dedup.admit(&end));
    }

    #[test]
    fn key_combines_type_and_hash() {
        let key = Dedup::key(&ai("abc"));
        assert_eq!(key, "ai_message:900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn suspended_snapshot_emits_text_and_command() {
        let mut state = ConversationState::new("t1");
        state.messages.push(ChatMessage::assistant("正在清除场景"));

        let snapshot = Snapshot {
            node: None,
            state,
            forwarded: Some(CommandDescriptor::forward(
                &ToolOperation::ClearScene,
                "场景已成功清除。",
            )),
        };

        let messages = snapshot_messages(&snapshot);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ai("正在清除场景"));
        assert!(matches!(
            &messages[1],
            OutboundMessage::ToolCall { tool_func, .. } if tool_func == "clear_scene"
        ));
    }

    #[test]
    fn user_and_tool_messages_are_not_echoed() {
        let mut state = ConversationState::new("t1");
        state.messages.push(ChatMessage::user("你好"));
        let snapshot = Snapshot {
            node: None,
            state,
            forwarded: None,
        };
        assert!(snapshot_messages(&snapshot).is_empty());
    }
}
