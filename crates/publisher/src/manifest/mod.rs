//! Published manifest chain
//!
//! Three JSON documents describe what has been published:
//!
//! - `modpack.json`: every file of one version plus its library versions
//! - `versions.json`: all published versions, in publish order
//! - `meta.json`: pointer to the version list and the latest version
//!
//! Each document is stored as a zlib stream regardless of file-level
//! compression rules.

pub mod keys;
pub mod versions;

pub use keys::ManifestKeys;
pub use versions::{ExistingManifests, PublishedManifests, VersionManifestManager};

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::uploader::core::{ModpackFileEntry, PublishError, Result, decompress, deflate};

/// Descriptor of one published version (`modpack.json`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModpackDescriptor {
    pub files: Vec<ModpackFileEntry>,
    pub version_name: String,
    /// Library name to version, e.g. `net.minecraftforge` to `10.13.4.1614`
    pub libraries: BTreeMap<String, String>,
}

/// One entry of the version history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version_name: String,
    pub published_at: DateTime<Utc>,
    pub modpack_url: String,
    pub changelog_url: String,
}

/// Append-only version history (`versions.json`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionList {
    pub versions: Vec<VersionInfo>,
}

impl VersionList {
    pub fn contains(&self, version_name: &str) -> bool {
        self.versions.iter().any(|v| v.version_name == version_name)
    }

    pub fn latest(&self) -> Option<&VersionInfo> {
        self.versions.last()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Pointer to the current release (`meta.json`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaPointer {
    pub versions_url: String,
    pub latest_version: VersionInfo,
}

/// Serialize a manifest and deflate it for upload
pub fn encode_manifest<T: Serialize>(key: &str, value: &T) -> Result<Bytes> {
    let json = serde_json::to_vec_pretty(value).map_err(|source| PublishError::ManifestParse {
        key: key.to_string(),
        source,
    })?;
    Ok(Bytes::from(deflate(key, &json)?))
}

/// Inflate and parse a manifest fetched from the store
pub fn decode_manifest<T: DeserializeOwned>(key: &str, data: &[u8]) -> Result<T> {
    let json = decompress(key, data).map_err(|error| match error {
        PublishError::Compression { source, .. } => PublishError::ManifestDecode {
            key: key.to_string(),
            source,
        },
        other => other,
    })?;
    serde_json::from_slice(&json).map_err(|source| PublishError::ManifestParse {
        key: key.to_string(),
        source,
    })
}
