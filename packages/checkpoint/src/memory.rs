//! In-memory checkpoint store.

use std::collections::HashMap;

use space_agent_models::ConversationState;
use tokio::sync::RwLock;

use crate::{CheckpointError, CheckpointStore, CheckpointSummary, now, thread_title};

struct Entry {
    state: ConversationState,
    created_at: String,
    updated_at: String,
    revision: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    revision: u64,
}

/// Checkpoints kept in process memory. Lost on restart.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    inner: RwLock<Inner>,
}

impl MemoryCheckpointStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, state: &ConversationState) -> Result<(), CheckpointError> {
        let mut inner = self.inner.write().await;
        inner.revision += 1;
        let revision = inner.revision;
        let timestamp = now();

        inner
            .entries
            .entry(state.thread_id.clone())
            .and_modify(|entry| {
                entry.state = state.clone();
                entry.updated_at.clone_from(&timestamp);
                entry.revision = revision;
            })
            .or_insert_with(|| Entry {
                state: state.clone(),
                created_at: timestamp.clone(),
                updated_at: timestamp.clone(),
                revision,
            });

        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>, CheckpointError> {
        Ok(self
            .inner
            .read()
            .await
            .entries
            .get(thread_id)
            .map(|e| e.state.clone()))
    }

    async fn delete(&self, thread_id: &str) -> Result<bool, CheckpointError> {
        Ok(self.inner.write().await.entries.remove(thread_id).is_some())
    }

    async fn list(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CheckpointSummary>, CheckpointError> {
        let inner = self.inner.read().await;
        let mut entries: Vec<&Entry> = inner.entries.values().collect();
        entries.sort_by(|a, b| b.revision.cmp(&a.revision));

        Ok(entries
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|e| CheckpointSummary {
                thread_id: e.state.thread_id.clone(),
                title: thread_title(&e.state.messages),
                created_at: e.created_at.clone(),
                updated_at: e.updated_at.clone(),
                message_count: i64::try_from(e.state.messages.len()).unwrap_or(i64::MAX),
            })
            .collect())
    }

    async fn count(&self) -> Result<u64, CheckpointError> {
        Ok(self.inner.read().await.entries.len() as u64)
    }
}
