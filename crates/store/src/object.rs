use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use chatrelay_core::StoreError;

/// Minimal blob-store contract: opaque bytes under a string key, one record
/// per key, replaced wholesale on `put`.
///
/// `delete` is idempotent: deleting an absent key succeeds. Implementations
/// classify every failure as either `NotFound` or `Transient` so callers can
/// decide whether to degrade or surface.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let objects = self.objects.read().await;
        objects.get(key).cloned().ok_or_else(|| StoreError::NotFound(key.to_owned()))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;
        objects.insert(key.to_owned(), body);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;
        objects.remove(key);
        Ok(())
    }
}
