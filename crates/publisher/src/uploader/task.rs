//! Single-file upload task with dedup and retry
//!
//! A task hashes the local file, asks the store whether identical content is
//! already at the destination key, and only transfers bytes when it is not.

use std::future::Future;

use bytes::Bytes;
use tokio::fs;
use tracing::{debug, warn};

use crate::storage::{ObjectMetadata, ObjectStore, StorageError, StorageResult};
use crate::uploader::{
    config::UploadConfig,
    core::{
        FileOperation, ModpackFileEntry, ProgressCallback, ProgressEvent, PublishError, Result,
        UploadOutcome, UploadRequest, compress, content_hash, is_compressible,
    },
    metrics::UploadMetrics,
};

/// A remote operation that failed on its last permitted attempt
#[derive(Debug)]
pub(crate) struct RetryExhausted {
    pub attempts: usize,
    pub last_error: StorageError,
}

/// Run `operation` until it succeeds, fails permanently, or uses up
/// `config.max_retries` attempts
///
/// Returns the value together with the number of attempts made.
pub(crate) async fn with_retry<T, F, Fut>(
    config: &UploadConfig,
    metrics: &UploadMetrics,
    key: &str,
    progress_callback: Option<&ProgressCallback>,
    mut operation: F,
) -> std::result::Result<(T, usize), RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StorageResult<T>>,
{
    let max_attempts = config.max_retries.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok((value, attempt)),
            Err(error) if error.is_recoverable() && attempt < max_attempts => {
                warn!(key, attempt, max_attempts, %error, "transient storage failure, retrying");
                metrics.record_retry();

                if let Some(callback) = progress_callback {
                    callback(ProgressEvent::RetryAttempt {
                        key: key.to_string(),
                        attempt: attempt + 1,
                        max_attempts,
                    });
                }

                tokio::time::sleep(config.get_retry_delay(attempt - 1)).await;
                attempt += 1;
            }
            Err(last_error) => {
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error,
                });
            }
        }
    }
}

/// Publish one local file to its destination key
pub async fn upload_file(
    store: &dyn ObjectStore,
    config: &UploadConfig,
    metrics: &UploadMetrics,
    request: &UploadRequest,
    progress_callback: Option<&ProgressCallback>,
) -> Result<UploadOutcome> {
    metrics.record_task_started();

    let result = run_upload(store, config, metrics, request, progress_callback).await;

    match &result {
        Ok(UploadOutcome::Uploaded { transferred, .. }) => metrics.record_uploaded(*transferred),
        Ok(UploadOutcome::Skipped { .. }) => metrics.record_skipped(),
        Err(error) => {
            metrics.record_failed();
            if let Some(callback) = progress_callback {
                callback(ProgressEvent::Error {
                    key: request.key.clone(),
                    error: error.to_string(),
                });
            }
        }
    }

    result
}

async fn run_upload(
    store: &dyn ObjectStore,
    config: &UploadConfig,
    metrics: &UploadMetrics,
    request: &UploadRequest,
    progress_callback: Option<&ProgressCallback>,
) -> Result<UploadOutcome> {
    let key = request.key.as_str();
    let contents = fs::read(&request.local_path)
        .await
        .map_err(|source| PublishError::FileSystem {
            path: request.local_path.clone(),
            operation: FileOperation::Read,
            source,
        })?;
    let size = contents.len() as u64;

    let (hash, contents) = tokio::task::spawn_blocking(move || (content_hash(&contents), contents))
        .await
        .map_err(|e| PublishError::WorkerFailed {
            reason: format!("hashing task failed: {}", e),
        })?;

    let entry = ModpackFileEntry {
        relative_path: request.relative_path.clone(),
        category: request.category,
        content_hash: hash.clone(),
        size_bytes: size,
        download_url: request.download_url.clone(),
        compressed: is_compressible(request.file_name()),
    };

    let (existing, _) = with_retry(config, metrics, key, progress_callback, || store.stat(key))
        .await
        .map_err(|exhausted| upload_failed(request, exhausted))?;

    if let Some(info) = existing {
        if info.content_hash.as_deref() == Some(hash.as_str()) {
            debug!(key, "identical content already stored, skipping");
            if let Some(callback) = progress_callback {
                callback(ProgressEvent::UploadSkipped { key: key.to_string() });
            }
            return Ok(UploadOutcome::Skipped { entry });
        }
        debug!(key, "stored object differs from local content, replacing");
    }

    let name = request.file_name().to_string();
    let (payload, compressed) = tokio::task::spawn_blocking(move || compress(&name, contents))
        .await
        .map_err(|e| PublishError::WorkerFailed {
            reason: format!("compression task failed: {}", e),
        })??;
    let payload = Bytes::from(payload);
    let transferred = payload.len() as u64;
    let metadata = ObjectMetadata::new()
        .with_content_hash(hash)
        .with_compressed(compressed);

    if let Some(callback) = progress_callback {
        callback(ProgressEvent::UploadStarted {
            key: key.to_string(),
            size: transferred,
        });
    }

    let ((), attempts) = with_retry(config, metrics, key, progress_callback, || {
        store.upload(payload.clone(), key, true, &metadata)
    })
    .await
    .map_err(|exhausted| upload_failed(request, exhausted))?;

    debug!(key, size, transferred, compressed, attempts, "uploaded");
    if let Some(callback) = progress_callback {
        callback(ProgressEvent::UploadComplete {
            key: key.to_string(),
            transferred,
            compressed,
        });
    }

    Ok(UploadOutcome::Uploaded {
        entry: ModpackFileEntry { compressed, ..entry },
        transferred,
        attempts,
    })
}

fn upload_failed(request: &UploadRequest, exhausted: RetryExhausted) -> PublishError {
    PublishError::UploadFailed {
        path: request.local_path.clone(),
        key: request.key.clone(),
        attempts: exhausted.attempts,
        last_cause: exhausted.last_error,
    }
}
