//! `SQLite` checkpoint store.
//!
//! Two tables: `checkpoints` holds one row per thread with the serialized
//! state (minus its history) and listing metadata; `messages` holds the
//! history, one row per message, ordered by `sequence`. Every save runs in a
//! single transaction.

use std::path::Path;

use moosicbox_json_utils::database::ToValue as _;
use serde::{Deserialize, Serialize};
use space_agent_models::{ChatMessage, ConversationState};
use switchy_database::{Database, DatabaseValue};
use switchy_database_connection::init_sqlite_rusqlite;

use crate::{CheckpointError, CheckpointStore, CheckpointSummary, now, thread_title};

/// Listing metadata stored alongside each checkpoint.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointMetadata {
    title: Option<String>,
    status: Option<String>,
    completed: bool,
}

/// A single stored message row.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    /// Ordering within the thread.
    pub sequence: i32,
    /// Role: "user", "assistant" or "tool".
    pub role: String,
    /// JSON-serialized [`ChatMessage`].
    pub content: String,
    /// When this message was stored.
    pub created_at: String,
}

/// Checkpoints persisted to a `SQLite` file.
pub struct SqliteCheckpointStore {
    db: Box<dyn Database>,
}

impl SqliteCheckpointStore {
    /// Opens (or creates) the checkpoints database and ensures the schema
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the database cannot be opened or
    /// schema creation fails.
    pub async fn open(path: &Path) -> Result<Self, CheckpointError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let db = init_sqlite_rusqlite(Some(path))
            .map_err(|e| CheckpointError::Connection(e.to_string()))?;

        ensure_schema(db.as_ref()).await?;

        log::debug!("Opened checkpoint database at {}", path.display());

        Ok(Self { db })
    }

    /// Raw message rows of a thread, for auditing.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the database operation fails.
    pub async fn stored_messages(
        &self,
        thread_id: &str,
    ) -> Result<Option<Vec<StoredMessage>>, CheckpointError> {
        let rows = self
            .db
            .query_raw_params(
                "SELECT sequence, role, content, created_at FROM messages
                 WHERE thread_id = $1
                 ORDER BY sequence",
                &[DatabaseValue::String(thread_id.to_string())],
            )
            .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            messages.push(StoredMessage {
                sequence: row.to_value("sequence").unwrap_or(0),
                role: row.to_value("role").unwrap_or_default(),
                content: row.to_value("content").unwrap_or_default(),
                created_at: row.to_value("created_at").unwrap_or_default(),
            });
        }

        Ok(Some(messages))
    }

    /// Resolves a thread id, supporting prefix matching.
    ///
    /// An exact match wins; otherwise exactly one thread must start with
    /// the given prefix.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::NotFound`] if nothing matches and
    /// [`CheckpointError::Ambiguous`] if several threads match.
    pub async fn resolve_id(&self, id: &str) -> Result<String, CheckpointError> {
        let exact = self
            .db
            .query_raw_params(
                "SELECT thread_id FROM checkpoints WHERE thread_id = $1",
                &[DatabaseValue::String(id.to_string())],
            )
            .await?;
        if !exact.is_empty() {
            return Ok(id.to_string());
        }

        let rows = self
            .db
            .query_raw_params(
                "SELECT thread_id FROM checkpoints WHERE thread_id LIKE $1 || '%' LIMIT 2",
                &[DatabaseValue::String(id.to_string())],
            )
            .await?;

        match rows.len() {
            0 => Err(CheckpointError::NotFound(id.to_string())),
            1 => Ok(rows
                .first()
                .map_or(String::new(), |r| r.to_value("thread_id").unwrap_or_default())),
            _ => Err(CheckpointError::Ambiguous(id.to_string())),
        }
    }
}

/// Creates all tables if they don't already exist.
async fn ensure_schema(db: &dyn Database) -> Result<(), CheckpointError> {
    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS checkpoints (
            thread_id   TEXT PRIMARY KEY,
            state       TEXT NOT NULL,
            metadata    TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        )",
    )
    .await?;

    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            thread_id   TEXT NOT NULL REFERENCES checkpoints(thread_id) ON DELETE CASCADE,
            sequence    INTEGER NOT NULL,
            role        TEXT NOT NULL,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(thread_id, sequence)
        )",
    )
    .await?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS idx_messages_thread
         ON messages (thread_id, sequence)",
    )
    .await?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS idx_checkpoints_updated
         ON checkpoints (updated_at)",
    )
    .await?;

    db.exec_raw("PRAGMA foreign_keys = ON").await?;

    Ok(())
}

/// Upserts the checkpoint row and replaces the thread's messages.
async fn write_checkpoint(
    db: &dyn Database,
    state: &ConversationState,
    timestamp: &str,
) -> Result<(), CheckpointError> {
    let mut head = state.clone();
    let messages = std::mem::take(&mut head.messages);

    let metadata = CheckpointMetadata {
        title: thread_title(&messages),
        status: serde_json::to_value(&state.status)
            .ok()
            .and_then(|v| v.get("state").and_then(|s| s.as_str()).map(str::to_string)),
        completed: state.completed,
    };

    db.exec_raw_params(
        "INSERT INTO checkpoints (thread_id, state, metadata, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $4)
         ON CONFLICT (thread_id) DO UPDATE SET
           state = excluded.state,
           metadata = excluded.metadata,
           updated_at = excluded.updated_at",
        &[
            DatabaseValue::String(state.thread_id.clone()),
            DatabaseValue::String(serde_json::to_string(&head)?),
            DatabaseValue::String(serde_json::to_string(&metadata)?),
            DatabaseValue::String(timestamp.to_string()),
        ],
    )
    .await?;

    db.exec_raw_params(
        "DELETE FROM messages WHERE thread_id = $1",
        &[DatabaseValue::String(state.thread_id.clone())],
    )
    .await?;

    for (i, msg) in messages.iter().enumerate() {
        let seq = i32::try_from(i).unwrap_or(i32::MAX);

        db.exec_raw_params(
            "INSERT INTO messages (thread_id, sequence, role, content, created_at)
             VALUES ($1, $2, $3, $4, $5)",
            &[
                DatabaseValue::String(state.thread_id.clone()),
                DatabaseValue::Int32(seq),
                DatabaseValue::String(msg.role().to_string()),
                DatabaseValue::String(serde_json::to_string(msg)?),
                DatabaseValue::String(timestamp.to_string()),
            ],
        )
        .await?;
    }

    Ok(())
}

#[async_trait::async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn save(&self, state: &ConversationState) -> Result<(), CheckpointError> {
        let timestamp = now();
        let txn = self.db.begin_transaction().await?;

        if let Err(e) = write_checkpoint(txn.as_ref(), state, &timestamp).await {
            log::error!("Failed to save checkpoint for {}: {e}", state.thread_id);
            if let Err(rollback) = txn.rollback().await {
                log::error!("Rollback failed for {}: {rollback}", state.thread_id);
            }
            return Err(e);
        }

        txn.commit().await?;

        log::trace!(
            "Saved checkpoint for {} ({} messages)",
            state.thread_id,
            state.messages.len()
        );

        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>, CheckpointError> {
        let rows = self
            .db
            .query_raw_params(
                "SELECT state FROM checkpoints WHERE thread_id = $1",
                &[DatabaseValue::String(thread_id.to_string())],
            )
            .await?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let state_json: String = row.to_value("state").unwrap_or_default();
        let mut state: ConversationState = serde_json::from_str(&state_json)?;

        let message_rows = self
            .db
            .query_raw_params(
                "SELECT content FROM messages
                 WHERE thread_id = $1
                 ORDER BY sequence",
                &[DatabaseValue::String(thread_id.to_string())],
            )
            .await?;

        let mut messages = Vec::with_capacity(message_rows.len());
        for row in &message_rows {
            let content: String = row.to_value("content").unwrap_or_default();
            messages.push(serde_json::from_str::<ChatMessage>(&content)?);
        }
        state.messages = messages;

        Ok(Some(state))
    }

    async fn delete(&self, thread_id: &str) -> Result<bool, CheckpointError> {
        let txn = self.db.begin_transaction().await?;

        let result = async {
            txn.exec_raw_params(
                "DELETE FROM messages WHERE thread_id = $1",
                &[DatabaseValue::String(thread_id.to_string())],
            )
            .await?;
            txn.exec_raw_params(
                "DELETE FROM checkpoints WHERE thread_id = $1",
                &[DatabaseValue::String(thread_id.to_string())],
            )
            .await
        }
        .await;

        match result {
            Ok(deleted) => {
                txn.commit().await?;
                Ok(deleted > 0)
            }
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    log::error!("Rollback failed for {thread_id}: {rollback}");
                }
                Err(e.into())
            }
        }
    }

    async fn list(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CheckpointSummary>, CheckpointError> {
        let rows = self
            .db
            .query_raw_params(
                "SELECT c.thread_id, c.metadata, c.created_at, c.updated_at,
                        (SELECT COUNT(*) FROM messages m WHERE m.thread_id = c.thread_id) as message_count
                 FROM checkpoints c
                 ORDER BY c.updated_at DESC
                 LIMIT $1 OFFSET $2",
                &[
                    DatabaseValue::Int32(i32::try_from(limit).unwrap_or(i32::MAX)),
                    DatabaseValue::Int32(i32::try_from(offset).unwrap_or(0)),
                ],
            )
            .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            let metadata_json: String = row.to_value("metadata").unwrap_or_default();
            let metadata: CheckpointMetadata =
                serde_json::from_str(&metadata_json).unwrap_or_default();

            summaries.push(CheckpointSummary {
                thread_id: row.to_value("thread_id").unwrap_or_default(),
                title: metadata.title,
                created_at: row.to_value("created_at").unwrap_or_default(),
                updated_at: row.to_value("updated_at").unwrap_or_default(),
                message_count: row.to_value("message_count").unwrap_or(0),
            });
        }

        Ok(summaries)
    }

    async fn count(&self) -> Result<u64, CheckpointError> {
        let rows = self
            .db
            .query_raw_params("SELECT COUNT(*) as cnt FROM checkpoints", &[])
            .await?;

        let count: i64 = rows.first().map_or(0, |r| r.to_value("cnt").unwrap_or(0));

        Ok(u64::try_from(count).unwrap_or(0))
    }
}
