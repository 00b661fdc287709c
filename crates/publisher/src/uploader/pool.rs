//! Bounded worker pool that drives upload tasks
//!
//! A fixed number of workers pull requests from a shared queue. The first
//! terminal failure cancels the run: workers stop taking new requests,
//! in-flight tasks get `shutdown_grace` to finish, and anything still running
//! after that is aborted. Files already uploaded stay in the store.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::storage::ObjectStore;
use crate::uploader::{
    config::UploadConfig,
    core::{ProgressCallback, PublishError, Result, UploadOutcome, UploadRequest},
    metrics::UploadMetrics,
    task::upload_file,
};

type WorkerResult = Result<Vec<UploadOutcome>>;

/// Shared state handed to every worker
#[derive(Clone)]
struct WorkerContext {
    store: Arc<dyn ObjectStore>,
    config: Arc<UploadConfig>,
    metrics: Arc<UploadMetrics>,
    progress_callback: Option<ProgressCallback>,
    queue: Arc<Mutex<VecDeque<UploadRequest>>>,
    cancel: CancellationToken,
}

/// Runs many upload tasks with bounded parallelism and fail-fast semantics
pub struct UploadPool {
    store: Arc<dyn ObjectStore>,
    config: Arc<UploadConfig>,
    metrics: Arc<UploadMetrics>,
    progress_callback: Option<ProgressCallback>,
}

impl UploadPool {
    pub fn new(store: Arc<dyn ObjectStore>, config: Arc<UploadConfig>, metrics: Arc<UploadMetrics>) -> Self {
        Self {
            store,
            config,
            metrics,
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn metrics(&self) -> &UploadMetrics {
        &self.metrics
    }

    /// Upload every request; returns outcomes in completion order
    ///
    /// On failure the first error encountered is returned once the pool has
    /// been shut down.
    pub async fn run(&self, requests: Vec<UploadRequest>) -> Result<Vec<UploadOutcome>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let total = requests.len();
        let workers = self.config.worker_count.max(1).min(total);
        debug!("Starting upload pool: {} files, {} workers", total, workers);

        let context = WorkerContext {
            store: self.store.clone(),
            config: self.config.clone(),
            metrics: self.metrics.clone(),
            progress_callback: self.progress_callback.clone(),
            queue: Arc::new(Mutex::new(VecDeque::from(requests))),
            cancel: CancellationToken::new(),
        };

        let mut join_set = JoinSet::new();
        for worker_id in 0..workers {
            join_set.spawn(run_worker(worker_id, context.clone()));
        }

        let mut outcomes = Vec::with_capacity(total);
        let mut first_error = None;

        while let Some(joined) = join_set.join_next().await {
            match flatten(joined) {
                Ok(mut completed) => outcomes.append(&mut completed),
                Err(error) => {
                    warn!("Upload failed, cancelling remaining work: {}", error);
                    context.cancel.cancel();
                    first_error = Some(error);
                    break;
                }
            }
        }

        if let Some(error) = first_error {
            self.drain(&mut join_set).await;
            return Err(error);
        }

        debug!("Upload pool finished: {} outcomes", outcomes.len());
        Ok(outcomes)
    }

    /// Wait for in-flight workers within the grace period, then abort the rest
    async fn drain(&self, join_set: &mut JoinSet<WorkerResult>) {
        let grace = self.config.shutdown_grace;

        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = join_set.join_next().await {
                if let Err(error) = flatten(joined) {
                    debug!("Discarding error from cancelled worker: {}", error);
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                "{} worker(s) still running after {:?}, forcing shutdown",
                join_set.len(),
                grace
            );
            join_set.abort_all();
            while join_set.join_next().await.is_some() {}
        }
        info!("Upload pool shut down");
    }
}

async fn run_worker(worker_id: usize, context: WorkerContext) -> WorkerResult {
    let mut completed = Vec::new();

    loop {
        if context.cancel.is_cancelled() {
            debug!(worker_id, "worker stopping after cancellation");
            break;
        }

        let next = context.queue.lock().await.pop_front();
        let Some(request) = next else {
            break;
        };

        let outcome = upload_file(
            context.store.as_ref(),
            &context.config,
            &context.metrics,
            &request,
            context.progress_callback.as_ref(),
        )
        .await;

        match outcome {
            Ok(outcome) => completed.push(outcome),
            Err(error) => {
                context.cancel.cancel();
                return Err(error);
            }
        }
    }

    Ok(completed)
}

fn flatten(joined: std::result::Result<WorkerResult, JoinError>) -> WorkerResult {
    match joined {
        Ok(result) => result,
        Err(e) => Err(PublishError::WorkerFailed {
            reason: if e.is_panic() {
                format!("worker panicked: {}", e)
            } else {
                format!("worker aborted: {}", e)
            },
        }),
    }
}
