//! Publish run
//!
//! [`Publisher`] sequences one publish: enumerate the three category
//! directories, reject a duplicate version, upload every file through the
//! pool, upload the changelog if there is one, then write the manifest
//! chain. Manifests are only touched after every file upload succeeded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::manifest::{ManifestKeys, PublishedManifests, VersionManifestManager};
use crate::storage::{ObjectMetadata, ObjectStore};
use crate::uploader::{
    Category, FileOperation, ProgressCallback, ProgressEvent, PublishError, Result, UploadConfig,
    UploadMetrics, UploadOutcome, UploadPool, UploadRequest, core::enumerate_files, task::with_retry,
};

/// Local source directory for each category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDirs {
    pub common: PathBuf,
    pub server: PathBuf,
    pub client: PathBuf,
}

impl SourceDirs {
    /// `common/`, `server/` and `client/` under one root
    pub fn under<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            common: root.join(Category::Common.as_str()),
            server: root.join(Category::Server.as_str()),
            client: root.join(Category::Client.as_str()),
        }
    }

    pub fn get(&self, category: Category) -> &Path {
        match category {
            Category::Common => &self.common,
            Category::Server => &self.server,
            Category::Client => &self.client,
        }
    }
}

/// Everything one publish run needs to know
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub project_id: String,
    pub version_name: String,
    pub base_download_url: String,
    pub sources: SourceDirs,
    pub libraries: BTreeMap<String, String>,
    pub changelog: Option<PathBuf>,
}

impl PublishRequest {
    pub fn new<P, V, B>(project_id: P, version_name: V, base_download_url: B, sources: SourceDirs) -> Self
    where
        P: Into<String>,
        V: Into<String>,
        B: Into<String>,
    {
        Self {
            project_id: project_id.into(),
            version_name: version_name.into(),
            base_download_url: base_download_url.into(),
            sources,
            libraries: BTreeMap::new(),
            changelog: None,
        }
    }

    pub fn with_library<N: Into<String>, V: Into<String>>(mut self, name: N, version: V) -> Self {
        self.libraries.insert(name.into(), version.into());
        self
    }

    pub fn with_changelog<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.changelog = Some(path.into());
        self
    }
}

/// Totals for a successful publish
#[derive(Debug, Clone, PartialEq)]
pub struct PublishSummary {
    pub version_name: String,
    pub total: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub bytes_uploaded: u64,
    pub retries: u64,
    pub elapsed: Duration,
    pub manifests: PublishedManifests,
}

impl PublishSummary {
    fn from_outcomes(
        outcomes: &[UploadOutcome],
        retries: u64,
        elapsed: Duration,
        manifests: PublishedManifests,
    ) -> Self {
        let (uploaded, skipped, bytes_uploaded) =
            outcomes
                .iter()
                .fold((0usize, 0usize, 0u64), |(uploaded, skipped, bytes), outcome| match outcome {
                    UploadOutcome::Uploaded { transferred, .. } => (uploaded + 1, skipped, bytes + transferred),
                    UploadOutcome::Skipped { .. } => (uploaded, skipped + 1, bytes),
                });

        Self {
            version_name: manifests.descriptor.version_name.clone(),
            total: outcomes.len(),
            uploaded,
            skipped,
            bytes_uploaded,
            retries,
            elapsed,
            manifests,
        }
    }
}

impl std::fmt::Display for PublishSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "published {}: processed {} files: {} uploaded, {} skipped in {:.2?}",
            self.version_name, self.total, self.uploaded, self.skipped, self.elapsed
        )
    }
}

pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    config: Arc<UploadConfig>,
    progress_callback: Option<ProgressCallback>,
}

impl Publisher {
    pub fn new(store: Arc<dyn ObjectStore>, config: UploadConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Publish one version and release the store afterwards, whatever the result
    pub async fn publish(&self, request: PublishRequest) -> Result<PublishSummary> {
        let result = self.run(request).await;

        debug!("Shutting down {} store", self.store.name());
        self.store.shutdown().await;

        match &result {
            Ok(summary) => info!("{}", summary),
            Err(error) => warn!("Publish aborted: {}", error),
        }
        result
    }

    async fn run(&self, request: PublishRequest) -> Result<PublishSummary> {
        let started = Instant::now();
        let keys = ManifestKeys::new(
            request.project_id.as_str(),
            request.version_name.as_str(),
            request.base_download_url.as_str(),
        )?;

        let requests = collect_requests(&keys, &request.sources).await?;

        let manager = VersionManifestManager::new(self.store.clone(), keys.clone());
        let existing = manager.check_no_duplicate_version().await?;

        info!(
            "Publishing {} version {} ({} files, {} workers)",
            keys.project_id(),
            keys.version_name(),
            requests.len(),
            self.config.worker_count
        );
        self.emit(ProgressEvent::PublishStarted {
            total_files: requests.len(),
        });

        let metrics = Arc::new(UploadMetrics::default());
        let mut pool = UploadPool::new(self.store.clone(), self.config.clone(), metrics.clone());
        if let Some(callback) = &self.progress_callback {
            pool = pool.with_progress_callback(callback.clone());
        }
        let outcomes = pool.run(requests).await?;

        if let Some(changelog) = &request.changelog {
            self.upload_changelog(&keys, changelog, &metrics).await?;
        }

        let entries = outcomes.iter().map(|outcome| outcome.entry().clone()).collect();
        let manifests = manager
            .compose_and_persist(entries, request.libraries, existing.versions)
            .await?;

        let summary = PublishSummary::from_outcomes(
            &outcomes,
            metrics.snapshot().retries_attempted,
            started.elapsed(),
            manifests,
        );
        self.emit(ProgressEvent::PublishComplete {
            uploaded: summary.uploaded,
            skipped: summary.skipped,
        });
        Ok(summary)
    }

    async fn upload_changelog(&self, keys: &ManifestKeys, path: &Path, metrics: &UploadMetrics) -> Result<()> {
        let key = keys.changelog_key();
        let contents = tokio::fs::read(path)
            .await
            .map_err(|source| PublishError::FileSystem {
                path: path.to_path_buf(),
                operation: FileOperation::Read,
                source,
            })?;
        let payload = Bytes::from(contents);
        let metadata = ObjectMetadata::new();

        with_retry(&self.config, metrics, &key, self.progress_callback.as_ref(), || {
            self.store.upload(payload.clone(), &key, true, &metadata)
        })
        .await
        .map_err(|exhausted| PublishError::UploadFailed {
            path: path.to_path_buf(),
            key: key.clone(),
            attempts: exhausted.attempts,
            last_cause: exhausted.last_error,
        })?;

        debug!(key = %key, size = payload.len(), "changelog uploaded");
        Ok(())
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(callback) = &self.progress_callback {
            callback(event);
        }
    }
}

/// Enumerate every category up front so a missing directory fails the run
/// before any network call
async fn collect_requests(keys: &ManifestKeys, sources: &SourceDirs) -> Result<Vec<UploadRequest>> {
    let mut requests = Vec::new();

    for category in Category::ALL {
        let files = enumerate_files(sources.get(category)).await?;
        debug!("{}: {} file(s)", category, files.len());

        requests.extend(files.into_iter().map(|file| {
            let key = keys.file_key(category, &file.relative_path);
            UploadRequest {
                local_path: file.path,
                download_url: keys.download_url(&key),
                relative_path: file.relative_path,
                category,
                key,
            }
        }));
    }

    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_dirs_under_root() {
        let dirs = SourceDirs::under("/data/pack");
        assert_eq!(dirs.get(Category::Common), Path::new("/data/pack/common"));
        assert_eq!(dirs.get(Category::Server), Path::new("/data/pack/server"));
        assert_eq!(dirs.get(Category::Client), Path::new("/data/pack/client"));
    }

    #[tokio::test]
    async fn test_requests_carry_derived_keys_and_urls() {
        let temp = tempfile::tempdir().unwrap();
        let sources = SourceDirs::under(temp.path());
        tokio::fs::create_dir_all(sources.server.join("config")).await.unwrap();
        tokio::fs::write(sources.server.join("config/b.cfg"), b"Y").await.unwrap();

        let keys = ManifestKeys::new("pack", "v1", "https://cdn.example.com").unwrap();
        let requests = collect_requests(&keys, &sources).await.unwrap();

        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].category, Category::Server);
        assert_eq!(requests[0].key, "stable/pack/versions/v1/server/config/b.cfg");
        assert_eq!(
            requests[0].download_url,
            "https://cdn.example.com/stable/pack/versions/v1/server/config/b.cfg"
        );
        // Missing category directories are created empty
        assert!(sources.client.is_dir());
    }
}
