//! Object key layout and download URLs for one project and version

use url::Url;

use crate::uploader::core::{Category, PublishError, Result};

const ROOT: &str = "stable";

/// Derives every key and URL a publish touches
///
/// Keys are pure functions of the project, version, category and relative
/// path, so any download URL can be recomputed from those inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestKeys {
    project_id: String,
    version_name: String,
    base_download_url: Url,
}

impl ManifestKeys {
    pub fn new<P, V, B>(project_id: P, version_name: V, base_download_url: B) -> Result<Self>
    where
        P: Into<String>,
        V: Into<String>,
        B: Into<String>,
    {
        let project_id = project_id.into();
        let version_name = version_name.into();
        let base_download_url = base_download_url.into();

        check_segment(&project_id, "project_id")?;
        check_segment(&version_name, "version_name")?;
        let base_download_url = parse_base_url(&base_download_url)?;

        Ok(Self {
            project_id,
            version_name,
            base_download_url,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn version_name(&self) -> &str {
        &self.version_name
    }

    fn version_prefix(&self) -> String {
        format!("{}/{}/versions/{}", ROOT, self.project_id, self.version_name)
    }

    /// `stable/{project}/versions/{version}/{category}/{relative_path}`
    pub fn file_key(&self, category: Category, relative_path: &str) -> String {
        format!("{}/{}/{}", self.version_prefix(), category, relative_path)
    }

    /// `stable/{project}/versions/{version}/modpack.json`
    pub fn modpack_key(&self) -> String {
        format!("{}/modpack.json", self.version_prefix())
    }

    /// `stable/{project}/versions/{version}/changelog.md`
    pub fn changelog_key(&self) -> String {
        format!("{}/changelog.md", self.version_prefix())
    }

    /// `stable/{project}/versions.json`
    pub fn versions_key(&self) -> String {
        format!("{}/{}/versions.json", ROOT, self.project_id)
    }

    /// `stable/{project}/meta.json`
    pub fn meta_key(&self) -> String {
        format!("{}/{}/meta.json", ROOT, self.project_id)
    }

    /// `{base_download_url}/{key}`, each key segment percent-encoded
    pub fn download_url(&self, key: &str) -> String {
        let mut url = self.base_download_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(key.trim_start_matches('/').split('/'));
        }
        url.into()
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let suggestion = "Set MODPACK_BASE_URL to the public URL of the bucket";
    if raw.trim_end_matches('/').is_empty() {
        return Err(PublishError::configuration(
            "base download URL is empty",
            "base_download_url",
            suggestion,
        ));
    }

    match Url::parse(raw) {
        Ok(url) if !url.cannot_be_a_base() => Ok(url),
        Ok(_) => Err(PublishError::configuration(
            format!("base download URL '{}' cannot carry a path", raw),
            "base_download_url",
            suggestion,
        )),
        Err(e) => Err(PublishError::configuration(
            format!("base download URL '{}' is invalid: {}", raw, e),
            "base_download_url",
            suggestion,
        )),
    }
}

fn check_segment(value: &str, field: &str) -> Result<()> {
    let invalid = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains('/')
        || value.contains('\\');

    if invalid {
        return Err(PublishError::configuration(
            format!("{} '{}' cannot be used as a key segment", field, value),
            field,
            "Use a non-empty name without slashes",
        ));
    }
    Ok(())
}
