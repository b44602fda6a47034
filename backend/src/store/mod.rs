//! Record store interface
//!
//! The planning core reads and writes plain JSON records through a generic
//! collection-style store owned by the surrounding application. Field names
//! of the stored records are part of the interface and must not change.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use shared::LotId;
use std::fmt;
use thiserror::Error;

/// Logical collections used by the planning core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Inventory,
    HarvestPlans,
    Categories,
    Pricing,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Inventory => "inventory",
            Collection::HarvestPlans => "harvestPlans",
            Collection::Categories => "categories",
            Collection::Pricing => "pricing",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{collection} record not found: {id}")]
    NotFound { collection: Collection, id: String },

    #[error("{collection} record already exists: {id}")]
    Duplicate { collection: Collection, id: String },

    #[error("Invalid {collection} record: {message}")]
    InvalidRecord {
        collection: Collection,
        message: String,
    },

    #[error("Record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record store unavailable: {0}")]
    Unavailable(String),
}

/// Equality filter over top-level record fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    fields: Map<String, Value>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn matches(&self, record: &Value) -> bool {
        self.fields
            .iter()
            .all(|(field, expected)| record.get(field) == Some(expected))
    }
}

/// Generic collection-style record store
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a record; it must carry a string `id`
    async fn create(&self, collection: Collection, record: Value) -> Result<Value, StoreError>;

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError>;

    /// Replace an existing record
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        record: Value,
    ) -> Result<Value, StoreError>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;

    /// Records matching the filter, ordered by id
    async fn list(
        &self,
        collection: Collection,
        filter: &RecordFilter,
    ) -> Result<Vec<Value>, StoreError>;
}

/// Lot subsystem operation invoked once per executed harvest
#[async_trait]
pub trait LotQuantitySync: Send + Sync {
    /// Reduce the current quantity of a growing lot by the harvested amount
    async fn reduce_lot_quantity(&self, lot_id: &LotId, amount: u64) -> anyhow::Result<()>;
}

/// Id of a record, which must be a non-empty string
pub fn record_id(collection: Collection, record: &Value) -> Result<String, StoreError> {
    match record.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(StoreError::InvalidRecord {
            collection,
            message: "missing string id".to_string(),
        }),
    }
}

fn decode<T: DeserializeOwned>(collection: Collection, record: Value) -> Result<T, StoreError> {
    serde_json::from_value(record).map_err(|e| StoreError::InvalidRecord {
        collection,
        message: e.to_string(),
    })
}

/// Fetch and decode a record, failing when it is absent
pub async fn fetch<T: DeserializeOwned>(
    store: &dyn RecordStore,
    collection: Collection,
    id: &str,
) -> Result<T, StoreError> {
    match store.get(collection, id).await? {
        Some(record) => decode(collection, record),
        None => Err(StoreError::NotFound {
            collection,
            id: id.to_string(),
        }),
    }
}

/// Fetch and decode every record matching the filter
pub async fn fetch_all<T: DeserializeOwned>(
    store: &dyn RecordStore,
    collection: Collection,
    filter: &RecordFilter,
) -> Result<Vec<T>, StoreError> {
    store
        .list(collection, filter)
        .await?
        .into_iter()
        .map(|record| decode(collection, record))
        .collect()
}

/// Encode and insert a new record
pub async fn insert<T: Serialize + Sync>(
    store: &dyn RecordStore,
    collection: Collection,
    record: &T,
) -> Result<(), StoreError> {
    store
        .create(collection, serde_json::to_value(record)?)
        .await
        .map(|_| ())
}

/// Encode and replace an existing record
pub async fn replace<T: Serialize + Sync>(
    store: &dyn RecordStore,
    collection: Collection,
    id: &str,
    record: &T,
) -> Result<(), StoreError> {
    store
        .update(collection, id, serde_json::to_value(record)?)
        .await
        .map(|_| ())
}
