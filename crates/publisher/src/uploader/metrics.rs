//! Live counters for upload tasks
//!
//! Tasks update these atomically while the pool runs, so a reporter can read
//! a consistent-enough picture at any time. The authoritative uploaded and
//! skipped totals of a run are reduced from the task outcomes instead.

use std::sync::atomic::{AtomicU64, Ordering};

/// Performance metrics for uploads
#[derive(Debug, Default)]
pub struct UploadMetrics {
    pub tasks_started: AtomicU64,
    pub uploaded: AtomicU64,
    pub skipped: AtomicU64,
    pub failed: AtomicU64,
    pub retries_attempted: AtomicU64,
    pub bytes_uploaded: AtomicU64,
}

impl UploadMetrics {
    pub fn record_task_started(&self) {
        self.tasks_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_uploaded(&self, bytes: u64) {
        self.uploaded.fetch_add(1, Ordering::Relaxed);
        self.bytes_uploaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries_attempted.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> UploadMetricsSnapshot {
        UploadMetricsSnapshot {
            tasks_started: self.tasks_started.load(Ordering::Relaxed),
            uploaded: self.uploaded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retries_attempted: self.retries_attempted.load(Ordering::Relaxed),
            bytes_uploaded: self.bytes_uploaded.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of upload metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadMetricsSnapshot {
    pub tasks_started: u64,
    pub uploaded: u64,
    pub skipped: u64,
    pub failed: u64,
    pub retries_attempted: u64,
    pub bytes_uploaded: u64,
}

impl UploadMetricsSnapshot {
    /// Tasks that reached a final state
    pub fn finished(&self) -> u64 {
        self.uploaded + self.skipped + self.failed
    }

    /// Share of finished tasks that needed no transfer (0.0 to 1.0)
    pub fn skip_rate(&self) -> f64 {
        let finished = self.finished();
        if finished == 0 {
            0.0
        } else {
            self.skipped as f64 / finished as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_snapshot_reflects_records() {
        let metrics = UploadMetrics::default();
        metrics.record_task_started();
        metrics.record_task_started();
        metrics.record_uploaded(100);
        metrics.record_skipped();
        metrics.record_retry();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_started, 2);
        assert_eq!(snapshot.uploaded, 1);
        assert_eq!(snapshot.skipped, 1);
        assert_eq!(snapshot.bytes_uploaded, 100);
        assert_eq!(snapshot.retries_attempted, 1);
        assert_eq!(snapshot.skip_rate(), 0.5);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let metrics = Arc::new(UploadMetrics::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = metrics.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.record_uploaded(1);
                        metrics.record_skipped();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.uploaded, 8000);
        assert_eq!(snapshot.skipped, 8000);
        assert_eq!(snapshot.bytes_uploaded, 8000);
    }
}
