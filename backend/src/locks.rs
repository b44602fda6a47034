//! Per-record write serialization
//!
//! One writer at a time per `(collection, id)`. A mutating operation holds the
//! guard of every record it writes from load until write-back. Operations that
//! write several records take plan guards before inventory guards, and ids
//! within a collection in sorted order.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::store::Collection;

type RecordKey = (Collection, String);
type Registry = Mutex<HashMap<RecordKey, Arc<AsyncMutex<()>>>>;

/// Registry of per-record locks
#[derive(Debug, Clone, Default)]
pub struct RecordLocks {
    registry: Arc<Registry>,
}

/// Exclusive write access to one record, released on drop
#[derive(Debug)]
pub struct RecordGuard {
    key: RecordKey,
    guard: Option<OwnedMutexGuard<()>>,
    registry: Arc<Registry>,
}

impl RecordGuard {
    pub fn id(&self) -> &str {
        &self.key.1
    }
}

impl Drop for RecordGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the registry still references the lock: nobody holds or awaits it
        if registry
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            registry.remove(&self.key);
        }
    }
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one record
    pub async fn acquire(&self, collection: Collection, id: &str) -> RecordGuard {
        let key = (collection, id.to_string());
        let lock = {
            let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry.entry(key.clone()).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        tracing::trace!(collection = %collection, id, "Record lock acquired");

        RecordGuard {
            key,
            guard: Some(guard),
            registry: self.registry.clone(),
        }
    }

    /// Wait for exclusive access to several records of one collection.
    ///
    /// Duplicate ids are locked once; locks are taken in sorted id order.
    pub async fn acquire_many<I, S>(&self, collection: Collection, ids: I) -> Vec<RecordGuard>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: BTreeSet<String> = ids.into_iter().map(Into::into).collect();
        let mut guards = Vec::with_capacity(ids.len());
        for id in &ids {
            guards.push(self.acquire(collection, id).await);
        }
        guards
    }

    /// Number of records currently locked or awaited
    pub fn active(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_guard_excludes_second_writer() {
        let locks = RecordLocks::new();
        let guard = locks.acquire(Collection::Inventory, "inv-1").await;

        let contender = locks.clone();
        let waiting = tokio::spawn(async move {
            contender.acquire(Collection::Inventory, "inv-1").await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_distinct_records_do_not_block() {
        let locks = RecordLocks::new();
        let _a = locks.acquire(Collection::Inventory, "inv-1").await;
        let _b = locks.acquire(Collection::Inventory, "inv-2").await;
        let _plan = locks.acquire(Collection::HarvestPlans, "inv-1").await;
        assert_eq!(locks.active(), 3);
    }

    #[tokio::test]
    async fn test_released_locks_are_pruned() {
        let locks = RecordLocks::new();
        let guards = locks
            .acquire_many(Collection::Inventory, ["b", "a", "b"])
            .await;
        assert_eq!(guards.iter().map(RecordGuard::id).collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(locks.active(), 2);

        drop(guards);
        assert_eq!(locks.active(), 0);
    }
}
