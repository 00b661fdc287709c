//! Progress tracking and reporting for publish runs

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{info, warn};

/// Progress callback for publish operations
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Events emitted during a publish run
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    PublishStarted {
        total_files: usize,
    },
    UploadStarted {
        key: String,
        size: u64,
    },
    UploadComplete {
        key: String,
        transferred: u64,
        compressed: bool,
    },
    UploadSkipped {
        key: String,
    },
    RetryAttempt {
        key: String,
        attempt: usize,
        max_attempts: usize,
    },
    Error {
        key: String,
        error: String,
    },
    PublishComplete {
        uploaded: usize,
        skipped: usize,
    },
}

/// Trait for progress reporting with more granular control
pub trait ProgressReporter: Send + Sync {
    fn on_publish_started(&self, _total_files: usize) {}
    fn on_upload_started(&self, _key: &str, _size: u64) {}
    fn on_upload_complete(&self, _key: &str, _transferred: u64, _compressed: bool) {}
    fn on_upload_skipped(&self, _key: &str) {}
    fn on_retry_attempt(&self, _key: &str, _attempt: usize, _max_attempts: usize) {}
    fn on_error(&self, _key: &str, _error: &str) {}
    fn on_publish_complete(&self, _uploaded: usize, _skipped: usize) {}
}

/// Extension trait to convert ProgressReporter to ProgressCallback
pub trait IntoProgressCallback {
    fn into_callback(self) -> ProgressCallback;
}

impl<T: ProgressReporter + 'static> IntoProgressCallback for T {
    fn into_callback(self) -> ProgressCallback {
        Arc::new(move |event| match event {
            ProgressEvent::PublishStarted { total_files } => {
                self.on_publish_started(total_files);
            }
            ProgressEvent::UploadStarted { key, size } => {
                self.on_upload_started(&key, size);
            }
            ProgressEvent::UploadComplete { key, transferred, compressed } => {
                self.on_upload_complete(&key, transferred, compressed);
            }
            ProgressEvent::UploadSkipped { key } => {
                self.on_upload_skipped(&key);
            }
            ProgressEvent::RetryAttempt { key, attempt, max_attempts } => {
                self.on_retry_attempt(&key, attempt, max_attempts);
            }
            ProgressEvent::Error { key, error } => {
                self.on_error(&key, &error);
            }
            ProgressEvent::PublishComplete { uploaded, skipped } => {
                self.on_publish_complete(uploaded, skipped);
            }
        })
    }
}

/// Reporter that writes a running `current/total` line through `tracing`
#[derive(Debug, Default)]
pub struct LogProgressReporter {
    total: AtomicUsize,
    processed: AtomicUsize,
}

impl LogProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn advance(&self, key: &str, action: &str) {
        let current = self.processed.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total.load(Ordering::SeqCst);
        let percent = if total > 0 {
            (current as f64 * 10000.0 / total as f64).round() / 100.0
        } else {
            0.0
        };
        info!("progress: {}/{} ({}%) | {}: {}", current, total, percent, action, key);
    }
}

impl ProgressReporter for LogProgressReporter {
    fn on_publish_started(&self, total_files: usize) {
        self.total.store(total_files, Ordering::SeqCst);
        self.processed.store(0, Ordering::SeqCst);
    }

    fn on_upload_complete(&self, key: &str, _transferred: u64, _compressed: bool) {
        self.advance(key, "uploaded");
    }

    fn on_upload_skipped(&self, key: &str) {
        self.advance(key, "skipped");
    }

    fn on_retry_attempt(&self, key: &str, attempt: usize, max_attempts: usize) {
        warn!("retrying {} (attempt {}/{})", key, attempt, max_attempts);
    }

    fn on_error(&self, key: &str, error: &str) {
        warn!("upload of {} failed: {}", key, error);
    }

    fn on_publish_complete(&self, uploaded: usize, skipped: usize) {
        info!(
            "all files processed: {} total, {} uploaded, {} skipped",
            uploaded + skipped,
            uploaded,
            skipped
        );
    }
}

/// Null progress reporter that does nothing
#[derive(Debug, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {}
