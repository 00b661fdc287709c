//! Content enumeration
//!
//! Walks a source directory and lists every regular file with its path
//! relative to the base, always using `/` as the separator.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::uploader::core::error::{PublishError, Result};

/// A regular file found under a source directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute or caller-relative path on disk
    pub path: PathBuf,
    /// Path relative to the enumerated base, `/`-separated
    pub relative_path: String,
}

/// Enumerate all regular files under `base`, recursively
///
/// The base directory is created when missing. Symbolic links and other
/// non-regular entries are ignored. Results are sorted by relative path.
/// A file whose name is not valid UTF-8 fails the walk.
pub async fn enumerate_files(base: &Path) -> Result<Vec<SourceFile>> {
    let access_error = |source| PublishError::DirectoryAccess {
        path: base.to_path_buf(),
        source,
    };

    fs::create_dir_all(base).await.map_err(access_error)?;

    let mut files = Vec::new();
    let mut pending = vec![base.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await.map_err(|source| PublishError::DirectoryAccess {
            path: dir.clone(),
            source,
        })?;

        while let Some(entry) = entries.next_entry().await.map_err(|source| PublishError::DirectoryAccess {
            path: dir.clone(),
            source,
        })? {
            let file_type = entry.file_type().await.map_err(|source| PublishError::DirectoryAccess {
                path: entry.path(),
                source,
            })?;
            let path = entry.path();

            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                let relative_path = relative_slash_path(base, &path)?;
                files.push(SourceFile { path, relative_path });
            }
        }
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    debug!("Enumerated {} files under {}", files.len(), base.display());
    Ok(files)
}

/// Express `path` relative to `base` with `/` separators
pub fn relative_slash_path(base: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(base).map_err(|_| PublishError::DirectoryAccess {
        path: path.to_path_buf(),
        source: std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("not located under {}", base.display()),
        ),
    })?;

    // Names end up in object keys and download URLs, which cannot carry
    // arbitrary bytes.
    let mut segments = Vec::new();
    for component in relative.components() {
        if let Component::Normal(segment) = component {
            let segment = segment.to_str().ok_or_else(|| PublishError::DirectoryAccess {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, "file name is not valid UTF-8"),
            })?;
            segments.push(segment);
        }
    }

    Ok(segments.join("/"))
}
