//! Upload pipeline
//!
//! This module contains everything between a list of local files and a set
//! of uploaded objects: core types, configuration, the per-file upload task
//! and the bounded worker pool that runs it.

pub mod config;
pub mod core;
pub mod metrics;
pub mod pool;
pub mod task;

// Re-export main types for convenience
pub use config::{UploadConfig, UploadConfigBuilder};
pub use core::{
    Category, ErrorSeverity, FileOperation, IntoProgressCallback, LogProgressReporter, ManifestStage,
    ModpackFileEntry, NullProgressReporter, ProgressCallback, ProgressEvent, ProgressReporter, PublishError,
    Result, SourceFile, UploadOutcome, UploadRequest,
};
pub use metrics::{UploadMetrics, UploadMetricsSnapshot};
pub use pool::UploadPool;
pub use task::upload_file;
