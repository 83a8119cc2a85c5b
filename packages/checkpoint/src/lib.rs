#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Checkpoint persistence for space agent conversation threads.
//!
//! A checkpoint is the full [`ConversationState`] of a thread, saved after
//! every graph node so a suspended thread can be resumed later, possibly by
//! another process. Two stores are provided:
//!
//! - [`MemoryCheckpointStore`] keeps everything in process memory
//! - [`SqliteCheckpointStore`] persists to `data/checkpoints.db`, where the
//!   `space_agent_checkpoints` CLI can audit it
//!
//! The `SQLite` store uses `switchy_database` for all database operations.

pub mod interactive;
pub mod memory;
pub mod sqlite;

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use space_agent_models::{ChatMessage, ConversationState};
use thiserror::Error;

pub use memory::MemoryCheckpointStore;
pub use sqlite::{SqliteCheckpointStore, StoredMessage};

/// Default path for the checkpoints database.
pub const DEFAULT_DB_PATH: &str = "data/checkpoints.db";

/// Maximum title length (truncated from first user message).
const MAX_TITLE_LENGTH: usize = 100;

/// Maximum tool output shown by [`format_transcript`].
const MAX_TOOL_OUTPUT: usize = 500;

/// Errors from checkpoint storage operations.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// A database query or command failed.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// The database could not be opened.
    #[error("Connection error: {0}")]
    Connection(String),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No thread matches the given id or prefix.
    #[error("No thread found matching: {0}")]
    NotFound(String),

    /// More than one thread matches the given prefix.
    #[error("Multiple threads match prefix '{0}'. Be more specific.")]
    Ambiguous(String),

    /// Unknown `CHECKPOINT_BACKEND` value.
    #[error("Unknown checkpoint backend: {0}. Use 'memory' or 'sqlite'.")]
    UnknownBackend(String),
}

/// Summary of a stored thread for listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointSummary {
    /// Thread identifier.
    pub thread_id: String,
    /// Title (first user message, truncated).
    pub title: Option<String>,
    /// When the thread was first saved.
    pub created_at: String,
    /// When the thread was last saved.
    pub updated_at: String,
    /// Total number of messages.
    pub message_count: i64,
}

/// Persistence for per-thread conversation state.
#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Saves the state, replacing any previous checkpoint of the thread.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the state cannot be persisted.
    async fn save(&self, state: &ConversationState) -> Result<(), CheckpointError>;

    /// Loads the latest checkpoint of a thread.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the store cannot be read.
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>, CheckpointError>;

    /// Deletes a thread. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the store cannot be written.
    async fn delete(&self, thread_id: &str) -> Result<bool, CheckpointError>;

    /// Lists threads, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the store cannot be read.
    async fn list(&self, limit: u32, offset: u32)
    -> Result<Vec<CheckpointSummary>, CheckpointError>;

    /// Number of stored threads.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the store cannot be read.
    async fn count(&self) -> Result<u64, CheckpointError>;
}

/// Opens the store selected by `CHECKPOINT_BACKEND` (`memory` by default).
///
/// The `sqlite` backend uses `CHECKPOINT_DB_PATH`, falling back to
/// [`DEFAULT_DB_PATH`].
///
/// # Errors
///
/// Returns [`CheckpointError`] if the backend is unknown or the database
/// cannot be opened.
pub async fn open_store_from_env() -> Result<Arc<dyn CheckpointStore>, CheckpointError> {
    let backend = std::env::var("CHECKPOINT_BACKEND").unwrap_or_else(|_| "memory".to_string());

    match backend.to_lowercase().as_str() {
        "memory" => {
            log::info!("Using in-memory checkpoint store");
            Ok(Arc::new(MemoryCheckpointStore::new()))
        }
        "sqlite" => {
            let path = std::env::var("CHECKPOINT_DB_PATH")
                .unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
            log::info!("Using SQLite checkpoint store at {path}");
            Ok(Arc::new(SqliteCheckpointStore::open(Path::new(&path)).await?))
        }
        other => Err(CheckpointError::UnknownBackend(other.to_string())),
    }
}

/// Title shown in listings: the first user message, truncated.
#[must_use]
pub fn thread_title(messages: &[ChatMessage]) -> Option<String> {
    messages
        .iter()
        .find(|m| matches!(m, ChatMessage::User { .. }))
        .map(|m| truncate_chars(m.content().trim(), MAX_TITLE_LENGTH))
}

/// Formats a thread's history for human-readable display.
///
/// Shows user messages, assistant answers with the tool they requested, and
/// tool outputs (truncated).
#[must_use]
pub fn format_transcript(messages: &[ChatMessage]) -> String {
    let mut output = String::new();

    for msg in messages {
        match msg {
            ChatMessage::User { content } => {
                let _ = writeln!(output, "--- USER ---");
                let _ = writeln!(output, "{content}");
            }
            ChatMessage::Assistant { content, tool_call } => {
                let _ = writeln!(output, "--- ASSISTANT ---");
                if !content.is_empty() {
                    let _ = writeln!(output, "{content}");
                }
                if let Some(call) = tool_call {
                    let _ = writeln!(output, "[TOOL CALL: {}]", call.kind());
                    let arguments = call.operation.arguments();
                    if !arguments.is_null()
                        && let Ok(pretty) = serde_json::to_string_pretty(&arguments)
                    {
                        let _ = writeln!(output, "{pretty}");
                    }
                }
            }
            ChatMessage::Tool { call_id, content } => {
                let _ = writeln!(output, "--- TOOL RESULT (for {call_id}) ---");
                let _ = writeln!(output, "{}", truncate_chars(content, MAX_TOOL_OUTPUT));
            }
        }
        let _ = writeln!(output);
    }

    output
}

/// Truncates to `max` characters, appending `...` when shortened.
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Timestamp format used for `created_at` / `updated_at`.
pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
