//! Version manifest manager
//!
//! Guards against republishing a version name and writes the manifest chain
//! once every file upload has succeeded. Composition is split into three
//! pure stages (descriptor, version list, meta pointer) followed by three
//! independent writes, in that order. The store offers no multi-object
//! transaction, so a crash between writes can leave the chain half-updated.
//!
//! The duplicate check is optimistic: nothing stops a second publisher from
//! writing the same version between our read and our write.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::{
    MetaPointer, ModpackDescriptor, VersionInfo, VersionList, decode_manifest, encode_manifest,
    keys::ManifestKeys,
};
use crate::storage::{ObjectMetadata, ObjectStore};
use crate::uploader::core::{ManifestStage, ModpackFileEntry, PublishError, Result};

/// Manifests found in the store before a publish
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExistingManifests {
    /// `None` on a first publish
    pub meta: Option<MetaPointer>,
    /// Empty on a first publish
    pub versions: VersionList,
}

/// The chain written by a successful publish
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedManifests {
    pub descriptor: ModpackDescriptor,
    pub versions: VersionList,
    pub meta: MetaPointer,
}

pub struct VersionManifestManager {
    store: Arc<dyn ObjectStore>,
    keys: ManifestKeys,
}

impl VersionManifestManager {
    pub fn new(store: Arc<dyn ObjectStore>, keys: ManifestKeys) -> Self {
        Self { store, keys }
    }

    pub fn keys(&self) -> &ManifestKeys {
        &self.keys
    }

    /// Load the current meta pointer and version list, failing if the target
    /// version name is already published
    pub async fn check_no_duplicate_version(&self) -> Result<ExistingManifests> {
        let version_name = self.keys.version_name();
        let meta: Option<MetaPointer> = self.read_optional(&self.keys.meta_key()).await?;
        let versions: VersionList = self
            .read_optional(&self.keys.versions_key())
            .await?
            .unwrap_or_default();

        if let Some(meta) = &meta {
            if !versions.contains(&meta.latest_version.version_name) {
                warn!(
                    "meta.json points at '{}' which is missing from versions.json",
                    meta.latest_version.version_name
                );
            }
        }

        let duplicate = versions.contains(version_name)
            || meta
                .as_ref()
                .is_some_and(|m| m.latest_version.version_name == version_name);
        if duplicate {
            return Err(PublishError::DuplicateVersion {
                version_name: version_name.to_string(),
            });
        }

        debug!(
            "Version '{}' is new ({} version(s) already published)",
            version_name,
            versions.len()
        );
        Ok(ExistingManifests { meta, versions })
    }

    /// Compose the new chain from the upload results and write it
    pub async fn compose_and_persist(
        &self,
        entries: Vec<ModpackFileEntry>,
        libraries: BTreeMap<String, String>,
        existing_versions: VersionList,
    ) -> Result<PublishedManifests> {
        let descriptor = self.build_descriptor(entries, libraries);
        let version = self.new_version_info(Utc::now());
        let versions = append_version(existing_versions, version);
        let meta = self.build_pointer(&versions)?;

        self.write_stage(ManifestStage::Modpack, &self.keys.modpack_key(), &descriptor)
            .await?;
        self.write_stage(ManifestStage::VersionList, &self.keys.versions_key(), &versions)
            .await?;
        self.write_stage(ManifestStage::MetaPointer, &self.keys.meta_key(), &meta)
            .await?;

        info!(
            "Published manifest chain for '{}' ({} files, {} versions)",
            descriptor.version_name,
            descriptor.files.len(),
            versions.len()
        );
        Ok(PublishedManifests {
            descriptor,
            versions,
            meta,
        })
    }

    /// Stage 1: files sorted by category then path for reproducible output
    pub fn build_descriptor(
        &self,
        mut entries: Vec<ModpackFileEntry>,
        libraries: BTreeMap<String, String>,
    ) -> ModpackDescriptor {
        entries.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then_with(|| a.relative_path.cmp(&b.relative_path))
        });

        ModpackDescriptor {
            files: entries,
            version_name: self.keys.version_name().to_string(),
            libraries,
        }
    }

    /// Version entry for this publish with derived URLs
    pub fn new_version_info(&self, published_at: DateTime<Utc>) -> VersionInfo {
        VersionInfo {
            version_name: self.keys.version_name().to_string(),
            published_at,
            modpack_url: self.keys.download_url(&self.keys.modpack_key()),
            changelog_url: self.keys.download_url(&self.keys.changelog_key()),
        }
    }

    /// Stage 3: pointer at the version list and its last entry
    pub fn build_pointer(&self, versions: &VersionList) -> Result<MetaPointer> {
        let latest = versions.latest().cloned().ok_or_else(|| PublishError::Configuration {
            message: "cannot build meta pointer from an empty version list".to_string(),
            field: None,
            suggestion: None,
        })?;

        Ok(MetaPointer {
            versions_url: self.keys.download_url(&self.keys.versions_key()),
            latest_version: latest,
        })
    }

    async fn read_optional<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let data = self
            .store
            .get_object(key)
            .await
            .map_err(|source| PublishError::ManifestRead {
                key: key.to_string(),
                source,
            })?;

        match data {
            Some(data) => Ok(Some(decode_manifest(key, &data)?)),
            None => {
                debug!("No manifest at {}", key);
                Ok(None)
            }
        }
    }

    async fn write_stage<T: serde::Serialize>(&self, stage: ManifestStage, key: &str, value: &T) -> Result<()> {
        let payload = encode_manifest(key, value)?;
        let metadata = ObjectMetadata::new().with_compressed(true);

        debug!("Writing {} manifest to {} ({} bytes)", stage, key, payload.len());
        self.store
            .upload(payload, key, true, &metadata)
            .await
            .map_err(|source| PublishError::ManifestWrite {
                stage,
                key: key.to_string(),
                source,
            })
    }
}

/// Stage 2: append to the history, preserving publish order
pub fn append_version(mut versions: VersionList, version: VersionInfo) -> VersionList {
    versions.versions.push(version);
    versions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryObjectStore;
    use crate::uploader::core::Category;
    use bytes::Bytes;

    fn manager(store: Arc<MemoryObjectStore>, version: &str) -> VersionManifestManager {
        let keys = ManifestKeys::new("pack", version, "https://cdn.example.com").unwrap();
        VersionManifestManager::new(store, keys)
    }

    fn entry(category: Category, path: &str) -> ModpackFileEntry {
        ModpackFileEntry {
            relative_path: path.to_string(),
            category,
            content_hash: "h".into(),
            size_bytes: 1,
            download_url: format!("https://cdn.example.com/{}", path),
            compressed: false,
        }
    }

    #[tokio::test]
    async fn test_first_publish_has_no_existing_manifests() {
        let store = Arc::new(MemoryObjectStore::new());
        let existing = manager(store, "v1").check_no_duplicate_version().await.unwrap();

        assert_eq!(existing, ExistingManifests::default());
    }

    #[tokio::test]
    async fn test_duplicate_version_is_rejected() {
        let store = Arc::new(MemoryObjectStore::new());
        let first = manager(store.clone(), "1.2.0");
        first
            .compose_and_persist(Vec::new(), BTreeMap::new(), VersionList::default())
            .await
            .unwrap();

        let result = manager(store.clone(), "1.2.0").check_no_duplicate_version().await;
        assert!(matches!(
            result,
            Err(PublishError::DuplicateVersion { ref version_name }) if version_name == "1.2.0"
        ));

        let next = manager(store, "1.3.0").check_no_duplicate_version().await.unwrap();
        assert_eq!(next.versions.len(), 1);
        assert_eq!(next.meta.unwrap().latest_version.version_name, "1.2.0");
    }

    #[tokio::test]
    async fn test_corrupt_version_list_aborts() {
        let store = Arc::new(MemoryObjectStore::new());
        store.insert("stable/pack/versions.json", Bytes::from_static(b"garbage"), ObjectMetadata::new());

        let result = manager(store, "v2").check_no_duplicate_version().await;
        assert!(matches!(
            result,
            Err(PublishError::ManifestDecode { ref key, .. }) if key == "stable/pack/versions.json"
        ));
    }

    #[tokio::test]
    async fn test_chain_appends_and_points_at_latest() {
        let store = Arc::new(MemoryObjectStore::new());
        manager(store.clone(), "v1")
            .compose_and_persist(Vec::new(), BTreeMap::new(), VersionList::default())
            .await
            .unwrap();

        let second = manager(store.clone(), "v2");
        let existing = second.check_no_duplicate_version().await.unwrap();
        let published = second
            .compose_and_persist(Vec::new(), BTreeMap::new(), existing.versions)
            .await
            .unwrap();

        let names: Vec<&str> = published
            .versions
            .versions
            .iter()
            .map(|v| v.version_name.as_str())
            .collect();
        assert_eq!(names, vec!["v1", "v2"]);
        assert_eq!(published.meta.latest_version, published.versions.versions[1]);
        assert_eq!(published.meta.versions_url, "https://cdn.example.com/stable/pack/versions.json");

        let stored: MetaPointer =
            decode_manifest("meta.json", &store.object("stable/pack/meta.json").unwrap()).unwrap();
        assert_eq!(stored, published.meta);
    }

    #[test]
    fn test_descriptor_orders_by_category_then_path() {
        let store = Arc::new(MemoryObjectStore::new());
        let descriptor = manager(store, "v1").build_descriptor(
            vec![
                entry(Category::Client, "a.txt"),
                entry(Category::Common, "z.json"),
                entry(Category::Server, "b.cfg"),
                entry(Category::Common, "a.json"),
            ],
            BTreeMap::from([("net.minecraft".to_string(), "1.7.10".to_string())]),
        );

        let order: Vec<(Category, &str)> = descriptor
            .files
            .iter()
            .map(|e| (e.category, e.relative_path.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (Category::Common, "a.json"),
                (Category::Common, "z.json"),
                (Category::Server, "b.cfg"),
                (Category::Client, "a.txt"),
            ]
        );
        assert_eq!(descriptor.libraries["net.minecraft"], "1.7.10");
    }

    #[test]
    fn test_pointer_requires_a_version() {
        let store = Arc::new(MemoryObjectStore::new());
        assert!(manager(store, "v1").build_pointer(&VersionList::default()).is_err());
    }
}
