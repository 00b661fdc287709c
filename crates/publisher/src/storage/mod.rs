//! Object storage capability
//!
//! The publisher never talks to a storage SDK directly. Everything it needs
//! from the remote store goes through the [`ObjectStore`] trait:
//!
//! - [`HttpObjectStore`] talks to an S3/COS-compatible bucket over HTTP
//! - [`MemoryObjectStore`] keeps objects in a map (tests and dry runs)

pub mod error;
pub mod http;
pub mod memory;

pub use error::{StorageError, StorageResult};
pub use http::{HttpObjectStore, StorageSettings};
pub use memory::MemoryObjectStore;

use async_trait::async_trait;
use bytes::Bytes;

/// What the store knows about an existing object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Stored size in bytes (after any compression)
    pub size: u64,
    /// Content identity recorded at upload time, if any
    pub content_hash: Option<String>,
}

/// Metadata attached to an object on upload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// Identity of the original, uncompressed content
    pub content_hash: Option<String>,
    /// Whether the payload is a zlib stream
    pub compressed: bool,
}

impl ObjectMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_hash<S: Into<String>>(mut self, hash: S) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn with_compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }
}

/// Trait for remote object storage backends
///
/// Implementations must be safe to call from many upload tasks at once.
/// Absence of an object is never an error: lookups return `None`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Look up an object's size and recorded identity
    async fn stat(&self, key: &str) -> StorageResult<Option<ObjectInfo>>;

    /// Check whether an object exists at `key`
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.stat(key).await?.is_some())
    }

    /// Fetch an object's bytes, `None` if there is no such object
    async fn get_object(&self, key: &str) -> StorageResult<Option<Bytes>>;

    /// Store `data` at `key`
    ///
    /// With `overwrite == false` an existing object makes the call fail with
    /// [`StorageError::AlreadyExists`].
    async fn upload(
        &self,
        data: Bytes,
        key: &str,
        overwrite: bool,
        metadata: &ObjectMetadata,
    ) -> StorageResult<()>;

    /// Release client resources
    async fn shutdown(&self) {}

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Reject keys that cannot be addressed consistently on every backend
pub fn validate_key(key: &str) -> StorageResult<()> {
    let reason = if key.is_empty() {
        Some("key is empty")
    } else if key.starts_with('/') {
        Some("key must be relative to the bucket root")
    } else if key.contains('\\') {
        Some("key must use forward slashes")
    } else if key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        Some("key contains an empty, '.' or '..' segment")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StorageError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key_accepts_nested_paths() {
        assert!(validate_key("stable/pack/versions/1.0/common/config/a.cfg").is_ok());
        assert!(validate_key("stable/pack/meta.json").is_ok());
    }

    #[test]
    fn test_validate_key_rejects_unaddressable_keys() {
        for key in ["", "/abs", "a//b", "a/../b", "a/./b", "a\\b", "trailing/"] {
            assert!(
                matches!(validate_key(key), Err(StorageError::InvalidKey { .. })),
                "expected '{}' to be rejected",
                key
            );
        }
    }
}
