//! End-to-end publish runs against the in-memory store

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use publisher::manifest::decode_manifest;
use publisher::storage::StorageResult;
use publisher::uploader::core::decompress;
use publisher::{
    Category, MemoryObjectStore, MetaPointer, ModpackDescriptor, ObjectInfo, ObjectMetadata, ObjectStore,
    ProgressEvent, PublishError, PublishRequest, Publisher, SourceDirs, UploadConfig, VersionList,
};
use tempfile::TempDir;

const BASE_URL: &str = "https://cdn.example.com";

fn config() -> UploadConfig {
    UploadConfig::builder()
        .worker_count(4)
        .retry_delay(Duration::from_millis(1))
        .build()
        .unwrap()
}

/// `common/a.json` = "X", `server/b.cfg` = "Y", empty `client/`
fn source_tree() -> TempDir {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();
    std::fs::create_dir_all(root.join("common")).unwrap();
    std::fs::create_dir_all(root.join("server")).unwrap();
    std::fs::create_dir_all(root.join("client")).unwrap();
    std::fs::write(root.join("common/a.json"), "X").unwrap();
    std::fs::write(root.join("server/b.cfg"), "Y").unwrap();
    temp
}

fn request(root: &Path, version: &str) -> PublishRequest {
    PublishRequest::new("pack", version, BASE_URL, SourceDirs::under(root))
        .with_library("net.minecraft", "1.7.10")
}

/// Shares a memory store and counts the uploads routed through it
struct CountingStore {
    inner: Arc<MemoryObjectStore>,
    uploads: AtomicUsize,
}

impl CountingStore {
    fn new(inner: Arc<MemoryObjectStore>) -> Self {
        Self {
            inner,
            uploads: AtomicUsize::new(0),
        }
    }

    fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn stat(&self, key: &str) -> StorageResult<Option<ObjectInfo>> {
        self.inner.stat(key).await
    }

    async fn get_object(&self, key: &str) -> StorageResult<Option<Bytes>> {
        self.inner.get_object(key).await
    }

    async fn upload(&self, data: Bytes, key: &str, overwrite: bool, metadata: &ObjectMetadata) -> StorageResult<()> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.inner.upload(data, key, overwrite, metadata).await
    }

    async fn shutdown(&self) {
        self.inner.shutdown().await
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

fn read<T: serde::de::DeserializeOwned>(store: &MemoryObjectStore, key: &str) -> T {
    let data = store.object(key).unwrap_or_else(|| panic!("missing {}", key));
    decode_manifest(key, &data).unwrap()
}

#[tokio::test]
async fn test_first_publish_writes_full_chain() {
    let sources = source_tree();
    let store = Arc::new(MemoryObjectStore::new());
    let publisher = Publisher::new(store.clone(), config());

    let summary = publisher.publish(request(sources.path(), "v1")).await.unwrap();

    assert_eq!(summary.version_name, "v1");
    assert_eq!(summary.total, 2);
    assert_eq!(summary.uploaded, 2);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.retries, 0);

    let descriptor: ModpackDescriptor = read(&store, "stable/pack/versions/v1/modpack.json");
    assert_eq!(descriptor.version_name, "v1");
    assert_eq!(descriptor.files.len(), 2);
    assert!(descriptor.files.iter().all(|f| f.compressed));
    assert_eq!(descriptor.files[0].category, Category::Common);
    assert_eq!(descriptor.files[0].relative_path, "a.json");
    assert_eq!(
        descriptor.files[1].download_url,
        "https://cdn.example.com/stable/pack/versions/v1/server/b.cfg"
    );
    assert_eq!(descriptor.libraries["net.minecraft"], "1.7.10");
    assert_eq!(descriptor, summary.manifests.descriptor);

    let versions: VersionList = read(&store, "stable/pack/versions.json");
    assert_eq!(versions.len(), 1);
    assert_eq!(versions.versions[0].version_name, "v1");
    assert_eq!(
        versions.versions[0].modpack_url,
        "https://cdn.example.com/stable/pack/versions/v1/modpack.json"
    );

    let meta: MetaPointer = read(&store, "stable/pack/meta.json");
    assert_eq!(meta.latest_version.version_name, "v1");
    assert_eq!(meta.latest_version, versions.versions[0]);
    assert_eq!(meta.versions_url, "https://cdn.example.com/stable/pack/versions.json");

    let payload = store.object("stable/pack/versions/v1/common/a.json").unwrap();
    assert_eq!(decompress("a.json", &payload).unwrap(), b"X");
    assert!(store.is_shut_down());
}

#[tokio::test]
async fn test_duplicate_version_is_rejected_before_upload() {
    let sources = source_tree();
    let store = Arc::new(MemoryObjectStore::new());
    Publisher::new(store.clone(), config())
        .publish(request(sources.path(), "1.2.0"))
        .await
        .unwrap();
    let keys_before = store.keys();

    // New and changed files would otherwise be uploaded
    std::fs::write(sources.path().join("common/new.txt"), "fresh").unwrap();
    std::fs::write(sources.path().join("common/a.json"), "changed").unwrap();
    let counting = Arc::new(CountingStore::new(store.clone()));
    let result = Publisher::new(counting.clone(), config())
        .publish(request(sources.path(), "1.2.0"))
        .await;

    assert!(matches!(
        result,
        Err(PublishError::DuplicateVersion { ref version_name }) if version_name == "1.2.0"
    ));
    assert_eq!(counting.uploads(), 0);
    assert_eq!(store.keys(), keys_before);
    assert!(store.is_shut_down());
}

#[tokio::test]
async fn test_second_version_appends_to_history() {
    let sources = source_tree();
    let store = Arc::new(MemoryObjectStore::new());
    Publisher::new(store.clone(), config())
        .publish(request(sources.path(), "v1"))
        .await
        .unwrap();

    let summary = Publisher::new(store.clone(), config())
        .publish(request(sources.path(), "v2"))
        .await
        .unwrap();
    assert_eq!(summary.uploaded, 2);

    let versions: VersionList = read(&store, "stable/pack/versions.json");
    let names: Vec<&str> = versions.versions.iter().map(|v| v.version_name.as_str()).collect();
    assert_eq!(names, vec!["v1", "v2"]);

    let meta: MetaPointer = read(&store, "stable/pack/meta.json");
    assert_eq!(meta.latest_version, versions.versions[1]);
}

#[tokio::test]
async fn test_identical_objects_already_stored_are_skipped() {
    let sources = source_tree();
    let store = Arc::new(MemoryObjectStore::new());

    // A previous run uploaded common/a.json for v3 but died before the manifests
    let data = std::fs::read(sources.path().join("common/a.json")).unwrap();
    store.insert(
        "stable/pack/versions/v3/common/a.json",
        publisher::uploader::core::deflate("a.json", &data).unwrap(),
        ObjectMetadata::new()
            .with_content_hash(publisher::uploader::core::content_hash(&data))
            .with_compressed(true),
    );

    let summary = Publisher::new(store.clone(), config())
        .publish(request(sources.path(), "v3"))
        .await
        .unwrap();

    assert_eq!(summary.uploaded, 1);
    assert_eq!(summary.skipped, 1);
    let common = summary
        .manifests
        .descriptor
        .files
        .iter()
        .find(|f| f.category == Category::Common)
        .unwrap();
    assert!(common.compressed);
}

#[tokio::test]
async fn test_corrupt_version_list_aborts_run() {
    let sources = source_tree();
    let store = Arc::new(MemoryObjectStore::new());
    store.insert(
        "stable/pack/versions.json",
        publisher::uploader::core::deflate("versions.json", b"[not a list").unwrap(),
        ObjectMetadata::new(),
    );

    let result = Publisher::new(store.clone(), config())
        .publish(request(sources.path(), "v1"))
        .await;

    assert!(matches!(result, Err(PublishError::ManifestParse { .. })));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_changelog_is_uploaded_uncompressed() {
    let sources = source_tree();
    let changelog = sources.path().join("CHANGELOG.md");
    std::fs::write(&changelog, "# v1\n- first").unwrap();
    let store = Arc::new(MemoryObjectStore::new());

    let summary = Publisher::new(store.clone(), config())
        .publish(request(sources.path(), "v1").with_changelog(&changelog))
        .await
        .unwrap();

    assert_eq!(
        store.object("stable/pack/versions/v1/changelog.md").unwrap(),
        "# v1\n- first".as_bytes()
    );
    assert_eq!(
        summary.manifests.meta.latest_version.changelog_url,
        "https://cdn.example.com/stable/pack/versions/v1/changelog.md"
    );
}

#[tokio::test]
async fn test_progress_events_bracket_the_run() {
    let sources = source_tree();
    let store = Arc::new(MemoryObjectStore::new());
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();

    Publisher::new(store, config())
        .with_progress_callback(Arc::new(move |event: ProgressEvent| sink.lock().unwrap().push(event)))
        .publish(request(sources.path(), "v1"))
        .await
        .unwrap();

    let events = events.lock().unwrap();
    assert!(matches!(events.first(), Some(ProgressEvent::PublishStarted { total_files: 2 })));
    assert!(matches!(
        events.last(),
        Some(ProgressEvent::PublishComplete { uploaded: 2, skipped: 0 })
    ));
    let completed = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::UploadComplete { .. }))
        .count();
    assert_eq!(completed, 2);
}

#[tokio::test]
async fn test_unreadable_source_fails_before_network() {
    let temp = tempfile::tempdir().unwrap();
    // A file where the common directory should be
    std::fs::write(temp.path().join("common"), "not a dir").unwrap();
    let store = Arc::new(MemoryObjectStore::new());

    let result = Publisher::new(store.clone(), config())
        .publish(request(temp.path(), "v1"))
        .await;

    assert!(matches!(result, Err(PublishError::DirectoryAccess { .. })));
    assert!(store.is_empty());
    assert!(store.is_shut_down());
}
