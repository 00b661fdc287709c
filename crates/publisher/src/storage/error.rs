//! Error types for object storage backends

use thiserror::Error;

/// Failures reported by an [`ObjectStore`](super::ObjectStore) implementation
#[derive(Error, Debug)]
pub enum StorageError {
    /// Transport-level HTTP failure
    #[error("request to '{url}' failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The request did not complete within the configured timeout
    #[error("request for '{key}' timed out")]
    Timeout { key: String },

    /// The store answered with a non-success status
    #[error("store returned HTTP {status} for '{key}'")]
    Status { key: String, status: u16 },

    /// A non-overwriting upload hit an existing object
    #[error("object '{key}' already exists and overwrite was not requested")]
    AlreadyExists { key: String },

    /// The backend is temporarily unable to serve the request
    #[error("store unavailable for '{key}': {reason}")]
    Unavailable { key: String, reason: String },

    /// The key cannot be addressed on this store
    #[error("invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// The backend could not be constructed
    #[error("storage client setup failed: {reason}")]
    Client { reason: String },
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

impl StorageError {
    /// Check if error is transient (worth another attempt)
    pub fn is_recoverable(&self) -> bool {
        match self {
            StorageError::Http { source, .. } => {
                // 4xx responses other than throttling will fail the same way again
                source
                    .status()
                    .map_or(true, |status| status.is_server_error() || status.as_u16() == 429)
            }
            StorageError::Timeout { .. } => true,
            StorageError::Status { status, .. } => *status >= 500 || *status == 429,
            StorageError::Unavailable { .. } => true,
            StorageError::AlreadyExists { .. } => false,
            StorageError::InvalidKey { .. } => false,
            StorageError::Client { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            StorageError::Http { .. } => "http",
            StorageError::Timeout { .. } => "timeout",
            StorageError::Status { .. } => "status",
            StorageError::AlreadyExists { .. } => "already_exists",
            StorageError::Unavailable { .. } => "unavailable",
            StorageError::InvalidKey { .. } => "invalid_key",
            StorageError::Client { .. } => "client",
        }
    }

    pub(crate) fn from_reqwest(key: &str, url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            StorageError::Timeout {
                key: key.to_string(),
            }
        } else {
            StorageError::Http {
                url: url.to_string(),
                source: error,
            }
        }
    }
}
