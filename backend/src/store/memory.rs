//! In-memory record store

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{record_id, Collection, RecordFilter, RecordStore, StoreError};

/// Record store kept in process memory, for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with records, replacing any with the same id
    pub async fn seed(
        &self,
        collection: Collection,
        records: impl IntoIterator<Item = Value>,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection).or_default();
        for record in records {
            entries.insert(record_id(collection, &record)?, record);
        }
        Ok(())
    }

    pub async fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .await
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, collection: Collection, record: Value) -> Result<Value, StoreError> {
        let id = record_id(collection, &record)?;
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection).or_default();
        if entries.contains_key(&id) {
            return Err(StoreError::Duplicate { collection, id });
        }
        entries.insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(&collection)
            .and_then(|entries| entries.get(id))
            .cloned())
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        record: Value,
    ) -> Result<Value, StoreError> {
        if record_id(collection, &record)? != id {
            return Err(StoreError::InvalidRecord {
                collection,
                message: format!("record id does not match {}", id),
            });
        }
        let mut collections = self.collections.write().await;
        match collections
            .get_mut(&collection)
            .and_then(|entries| entries.get_mut(id))
        {
            Some(existing) => {
                *existing = record.clone();
                Ok(record)
            }
            None => Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            }),
        }
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        self.collections
            .write()
            .await
            .get_mut(&collection)
            .and_then(|entries| entries.remove(id))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })
    }

    async fn list(
        &self,
        collection: Collection,
        filter: &RecordFilter,
    ) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(&collection)
            .map(|entries| {
                entries
                    .values()
                    .filter(|record| filter.matches(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
