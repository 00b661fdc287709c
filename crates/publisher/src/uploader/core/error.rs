//! Error types for the publish pipeline with context and recovery information

use std::error::Error;
use std::path::PathBuf;
use thiserror::Error;

use crate::storage::StorageError;

/// Comprehensive error type for a publish run
#[derive(Error, Debug)]
pub enum PublishError {
    /// Local source directory missing or unreadable
    #[error("Cannot access source directory '{path}'")]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Target version name is already published
    #[error("Version '{version_name}' is already published (use a new version name)")]
    DuplicateVersion { version_name: String },

    /// A single file exhausted its retry budget
    #[error("Upload of '{path}' to '{key}' failed after {attempts} attempt(s)")]
    UploadFailed {
        path: PathBuf,
        key: String,
        attempts: usize,
        #[source]
        last_cause: StorageError,
    },

    /// Existing manifest could not be fetched
    #[error("Failed to read manifest '{key}'")]
    ManifestRead {
        key: String,
        #[source]
        source: StorageError,
    },

    /// Existing manifest is not a zlib stream
    #[error("Manifest '{key}' could not be inflated")]
    ManifestDecode {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Existing manifest is not valid JSON for its type
    #[error("Manifest '{key}' is corrupt")]
    ManifestParse {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// One of the three manifest writes failed
    #[error("Failed to write {stage} manifest '{key}' (manifest chain may be inconsistent)")]
    ManifestWrite {
        stage: ManifestStage,
        key: String,
        #[source]
        source: StorageError,
    },

    /// Local file system errors with file context
    #[error("File operation failed while {operation} '{path}'")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    /// Deflate stream could not be produced or read
    #[error("Compression failed for '{name}'")]
    Compression {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors
    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
        suggestion: Option<String>,
    },

    /// A pool worker panicked or was aborted
    #[error("Upload worker failed: {reason}")]
    WorkerFailed { reason: String },

    /// Storage errors outside a manifest or upload context
    #[error("Storage operation failed")]
    Storage(#[from] StorageError),
}

/// Types of file operations for error context
#[derive(Debug, Clone, PartialEq)]
pub enum FileOperation {
    Read,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
        }
    }
}

/// The three stages of the manifest chain, in write order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestStage {
    Modpack,
    VersionList,
    MetaPointer,
}

impl std::fmt::Display for ManifestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManifestStage::Modpack => write!(f, "modpack"),
            ManifestStage::VersionList => write!(f, "version list"),
            ManifestStage::MetaPointer => write!(f, "meta pointer"),
        }
    }
}

pub type Result<T> = std::result::Result<T, PublishError>;

impl PublishError {
    pub(crate) fn configuration<M, S>(message: M, field: &str, suggestion: S) -> Self
    where
        M: Into<String>,
        S: Into<String>,
    {
        PublishError::Configuration {
            message: message.into(),
            field: Some(field.to_string()),
            suggestion: Some(suggestion.into()),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            PublishError::DirectoryAccess { .. } => "directory_access",
            PublishError::DuplicateVersion { .. } => "duplicate_version",
            PublishError::UploadFailed { .. } => "upload_failed",
            PublishError::ManifestRead { .. } => "manifest_read",
            PublishError::ManifestDecode { .. } => "manifest_decode",
            PublishError::ManifestParse { .. } => "manifest_parse",
            PublishError::ManifestWrite { .. } => "manifest_write",
            PublishError::FileSystem { .. } => "file_system",
            PublishError::Compression { .. } => "compression",
            PublishError::Configuration { .. } => "configuration",
            PublishError::WorkerFailed { .. } => "worker_failed",
            PublishError::Storage(_) => "storage",
        }
    }

    /// Get severity level for error prioritization
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PublishError::DuplicateVersion { .. } => ErrorSeverity::Medium,
            PublishError::Configuration { .. } => ErrorSeverity::Medium,
            PublishError::DirectoryAccess { .. } => ErrorSeverity::High,
            PublishError::UploadFailed { .. } => ErrorSeverity::High,
            PublishError::ManifestRead { .. } => ErrorSeverity::High,
            PublishError::ManifestDecode { .. } => ErrorSeverity::High,
            PublishError::ManifestParse { .. } => ErrorSeverity::High,
            PublishError::FileSystem { .. } => ErrorSeverity::High,
            PublishError::Compression { .. } => ErrorSeverity::High,
            PublishError::WorkerFailed { .. } => ErrorSeverity::High,
            PublishError::Storage(_) => ErrorSeverity::High,
            // The remote manifest chain may now be half-written
            PublishError::ManifestWrite { .. } => ErrorSeverity::Critical,
        }
    }

    /// Get user-friendly suggestion for resolving the error
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            PublishError::DirectoryAccess { .. } => {
                Some("Check that the source directory exists and is readable")
            }
            PublishError::DuplicateVersion { .. } => {
                Some("Bump the version name; published versions are immutable")
            }
            PublishError::UploadFailed { .. } => {
                Some("Re-run the publish; files already uploaded will be skipped")
            }
            PublishError::ManifestDecode { .. } | PublishError::ManifestParse { .. } => {
                Some("Inspect or restore the remote manifest before publishing again")
            }
            PublishError::ManifestWrite { .. } => {
                Some("Verify modpack.json, versions.json and meta.json in the bucket and repair them by hand")
            }
            PublishError::Configuration { suggestion, .. } => suggestion.as_deref(),
            _ => None,
        }
    }

    /// Create a detailed error report for the terminal
    pub fn detailed_report(&self) -> String {
        let mut report = format!("Error: {}\n", self);
        report.push_str(&format!("Category: {}\n", self.category()));
        report.push_str(&format!("Severity: {:?}\n", self.severity()));

        if let Some(suggestion) = self.suggestion() {
            report.push_str(&format!("Suggestion: {}\n", suggestion));
        }

        if let Some(source) = self.source() {
            report.push_str(&format!("Root cause: {}\n", source));
        }

        report
    }
}

/// Error severity levels for prioritization
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}
