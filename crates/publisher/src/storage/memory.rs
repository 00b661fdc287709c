//! In-memory object storage backend

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::{ObjectInfo, ObjectMetadata, ObjectStore, StorageError, StorageResult, validate_key};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    metadata: ObjectMetadata,
}

/// Object store backed by a `RwLock<HashMap>`.
///
/// Used by the test suites and by `--dry-run` publishes.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    shut_down: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly, bypassing key validation
    pub fn insert<K: Into<String>>(&self, key: K, data: impl Into<Bytes>, metadata: ObjectMetadata) {
        let mut map = self.objects.write().expect("lock poisoned");
        map.insert(
            key.into(),
            StoredObject {
                data: data.into(),
                metadata,
            },
        );
    }

    /// Raw stored bytes for `key`
    pub fn object(&self, key: &str) -> Option<Bytes> {
        let map = self.objects.read().expect("lock poisoned");
        map.get(key).map(|object| object.data.clone())
    }

    /// Metadata recorded for `key`
    pub fn metadata(&self, key: &str) -> Option<ObjectMetadata> {
        let map = self.objects.read().expect("lock poisoned");
        map.get(key).map(|object| object.metadata.clone())
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let map = self.objects.read().expect("lock poisoned");
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn stat(&self, key: &str) -> StorageResult<Option<ObjectInfo>> {
        validate_key(key)?;
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(key).map(|object| ObjectInfo {
            size: object.data.len() as u64,
            content_hash: object.metadata.content_hash.clone(),
        }))
    }

    async fn get_object(&self, key: &str) -> StorageResult<Option<Bytes>> {
        validate_key(key)?;
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(key).map(|object| object.data.clone()))
    }

    async fn upload(
        &self,
        data: Bytes,
        key: &str,
        overwrite: bool,
        metadata: &ObjectMetadata,
    ) -> StorageResult<()> {
        validate_key(key)?;
        let mut map = self.objects.write().expect("lock poisoned");

        if !overwrite && map.contains_key(key) {
            return Err(StorageError::AlreadyExists {
                key: key.to_string(),
            });
        }

        debug!(key, size = data.len(), "storing object in memory");
        map.insert(
            key.to_string(),
            StoredObject {
                data,
                metadata: metadata.clone(),
            },
        );
        Ok(())
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        debug!("memory store shut down");
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
