//! Core types used throughout the upload pipeline
//!
//! This module contains the fundamental types that all other modules depend on.

pub mod compression;
pub mod error;
pub mod files;
pub mod hashing;
pub mod progress;

pub use compression::{compress, decompress, deflate, is_compressible};
pub use error::{ErrorSeverity, FileOperation, ManifestStage, PublishError, Result};
pub use files::{SourceFile, enumerate_files};
pub use hashing::content_hash;
pub use progress::{
    IntoProgressCallback, LogProgressReporter, NullProgressReporter, ProgressCallback, ProgressEvent,
    ProgressReporter,
};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Deployment target a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Common,
    Server,
    Client,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Common, Category::Server, Category::Client];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Common => "common",
            Category::Server => "server",
            Category::Client => "client",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One published file as it appears in `modpack.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModpackFileEntry {
    pub relative_path: String,
    pub category: Category,
    pub content_hash: String,
    /// Size of the original, uncompressed file
    pub size_bytes: u64,
    pub download_url: String,
    pub compressed: bool,
}

/// An upload request: one local file to one remote key
///
/// This is the unit of work the pool hands to each upload task.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// File on disk
    pub local_path: PathBuf,
    /// Path relative to its category directory, `/`-separated
    pub relative_path: String,
    pub category: Category,
    /// Destination object key
    pub key: String,
    /// Public URL the key is served from
    pub download_url: String,
}

impl UploadRequest {
    /// File name used for the compression decision
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(self.relative_path.as_str())
    }
}

/// Result of a single upload task
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Uploaded {
        entry: ModpackFileEntry,
        /// Payload bytes sent on the successful attempt
        transferred: u64,
        attempts: usize,
    },
    /// The store already held identical content at the key
    Skipped { entry: ModpackFileEntry },
}

impl UploadOutcome {
    pub fn entry(&self) -> &ModpackFileEntry {
        match self {
            UploadOutcome::Uploaded { entry, .. } | UploadOutcome::Skipped { entry } => entry,
        }
    }

    pub fn into_entry(self) -> ModpackFileEntry {
        match self {
            UploadOutcome::Uploaded { entry, .. } | UploadOutcome::Skipped { entry } => entry,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, UploadOutcome::Skipped { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Category::Server).unwrap(), "\"server\"");
        let parsed: Category = serde_json::from_str("\"client\"").unwrap();
        assert_eq!(parsed, Category::Client);
    }

    #[test]
    fn test_entry_uses_camel_case_fields() {
        let entry = ModpackFileEntry {
            relative_path: "config/a.cfg".into(),
            category: Category::Common,
            content_hash: "h".into(),
            size_bytes: 3,
            download_url: "https://cdn/a".into(),
            compressed: true,
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["relativePath"], "config/a.cfg");
        assert_eq!(json["sizeBytes"], 3);
        assert_eq!(json["downloadUrl"], "https://cdn/a");
    }

    #[test]
    fn test_file_name_is_last_segment() {
        let request = UploadRequest {
            local_path: PathBuf::from("/src/common/config/a.cfg"),
            relative_path: "config/a.cfg".into(),
            category: Category::Common,
            key: "k".into(),
            download_url: "u".into(),
        };
        assert_eq!(request.file_name(), "a.cfg");
    }
}
