//! Modpack Publisher Library
//!
//! This library publishes a versioned modpack to an object store. It
//! enumerates local files in the `common`, `server` and `client` categories,
//! uploads each file once per distinct content hash, and maintains the
//! manifest chain (`modpack.json`, `versions.json`, `meta.json`) that
//! launchers read.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use publisher::{
//!     HttpObjectStore, ProgressEvent, PublishRequest, Publisher, SourceDirs,
//!     StorageSettings, UploadConfig,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> publisher::Result<()> {
//! let settings = StorageSettings::new("modpacks-1250000000", "ap-shanghai")
//!     .with_credentials("secret-id", "secret-key");
//! let store = Arc::new(HttpObjectStore::new(settings)?);
//!
//! let request = PublishRequest::new(
//!     "my-pack",
//!     "1.2.0",
//!     "https://cdn.example.com",
//!     SourceDirs::under("/srv/my-pack"),
//! )
//! .with_library("net.minecraft", "1.7.10")
//! .with_changelog("/srv/my-pack/CHANGELOG.md");
//!
//! let progress_callback = Arc::new(|event: ProgressEvent| {
//!     if let ProgressEvent::UploadComplete { key, transferred, .. } = event {
//!         println!("Uploaded {} ({} bytes)", key, transferred);
//!     }
//! });
//!
//! let summary = Publisher::new(store, UploadConfig::default())
//!     .with_progress_callback(progress_callback)
//!     .publish(request)
//!     .await?;
//! println!("{}", summary);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Content dedup**: files whose xxHash64 matches the stored object are skipped
//! - **Compression**: text and config files are deflated before upload
//! - **Retry logic**: Transient storage failures are retried with exponential backoff
//! - **Bounded pool**: A fixed number of workers with fail-fast shutdown
//! - **Version guard**: Publishing an existing version name is rejected before any upload
//! - **Pluggable storage**: HTTP object store for production, in-memory store for tests and dry runs

pub mod config;
pub mod manifest;
pub mod publish;
pub mod storage;
pub mod uploader;

// Re-export commonly used types for convenience
pub use config::PublishConfig;
pub use manifest::{
    ManifestKeys, MetaPointer, ModpackDescriptor, PublishedManifests, VersionInfo, VersionList,
    VersionManifestManager,
};
pub use publish::{PublishRequest, PublishSummary, Publisher, SourceDirs};
pub use storage::{
    HttpObjectStore, MemoryObjectStore, ObjectInfo, ObjectMetadata, ObjectStore, StorageError,
    StorageSettings,
};
pub use uploader::{
    Category, IntoProgressCallback, LogProgressReporter, ModpackFileEntry, ProgressCallback,
    ProgressEvent, ProgressReporter, PublishError, Result, UploadConfig, UploadMetrics, UploadOutcome,
};
