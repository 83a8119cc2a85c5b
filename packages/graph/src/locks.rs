//! Per-thread serialization.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per thread id.
///
/// The registry lock is held only for lookup, never while a turn runs.
#[derive(Debug, Default)]
pub struct ThreadLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ThreadLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `thread_id`. Released on drop.
    pub async fn acquire(&self, thread_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Idle entries are only referenced by the map.
            locks.retain(|id, lock| id == thread_id || Arc::strong_count(lock) > 1);
            locks
                .entry(thread_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Drops the lock entry of a deleted thread.
    pub async fn forget(&self, thread_id: &str) {
        self.locks.lock().await.remove(thread_id);
    }

    #[cfg(test)]
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_thread_is_serialized() {
        let locks = Arc::new(ThreadLocks::new());
        let guard = locks.acquire("a").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("a").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_threads_do_not_block() {
        let locks = ThreadLocks::new();
        let _a = locks.acquire("a").await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.acquire("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn idle_entries_are_pruned() {
        let locks = ThreadLocks::new();
        drop(locks.acquire("a").await);
        drop(locks.acquire("b").await);
        assert_eq!(locks.tracked().await, 1);

        locks.forget("b").await;
        assert_eq!(locks.tracked().await, 0);
    }
}
