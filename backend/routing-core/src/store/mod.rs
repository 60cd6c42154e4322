//! External metadata store, consumed as a black box.
//!
//! The directory is authoritative for liveness; the store only carries
//! device metadata for durability. Store failures degrade durability but
//! never block registration.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persistent key-value store for device metadata
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn put(&self, id: &str, metadata: &Value) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Value>, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Process-local store, for embedding and tests.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryStore {
    async fn put(&self, id: &str, metadata: &Value) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(id.to_string(), metadata.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.remove(id);
        Ok(())
    }
}
