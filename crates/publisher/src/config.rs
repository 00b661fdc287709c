//! Run configuration loaded from `MODPACK_*` environment variables
//!
//! A `.env` file in the working directory is loaded first if present.
//! Required values are only checked when a request or storage settings are
//! built from the config, so callers can fill gaps from other sources
//! (command-line flags) in between.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::publish::{PublishRequest, SourceDirs};
use crate::storage::StorageSettings;
use crate::uploader::{Category, PublishError, Result, UploadConfig};

pub const ENV_PROJECT_ID: &str = "MODPACK_PROJECT_ID";
pub const ENV_VERSION: &str = "MODPACK_VERSION";
pub const ENV_BASE_URL: &str = "MODPACK_BASE_URL";
pub const ENV_SOURCE_DIR: &str = "MODPACK_SOURCE_DIR";
pub const ENV_COMMON_DIR: &str = "MODPACK_COMMON_DIR";
pub const ENV_SERVER_DIR: &str = "MODPACK_SERVER_DIR";
pub const ENV_CLIENT_DIR: &str = "MODPACK_CLIENT_DIR";
pub const ENV_LIBRARIES: &str = "MODPACK_LIBRARIES";
pub const ENV_CHANGELOG: &str = "MODPACK_CHANGELOG";
pub const ENV_ENDPOINT: &str = "MODPACK_ENDPOINT";
pub const ENV_BUCKET: &str = "MODPACK_BUCKET";
pub const ENV_REGION: &str = "MODPACK_REGION";
pub const ENV_SECRET_ID: &str = "MODPACK_SECRET_ID";
pub const ENV_SECRET_KEY: &str = "MODPACK_SECRET_KEY";
pub const ENV_WORKERS: &str = "MODPACK_WORKERS";
pub const ENV_MAX_RETRIES: &str = "MODPACK_MAX_RETRIES";
pub const ENV_TIMEOUT_SECS: &str = "MODPACK_TIMEOUT_SECS";

/// Libraries recorded when none are configured
pub const DEFAULT_LIBRARIES: &[(&str, &str)] = &[
    ("net.minecraft", "1.7.10"),
    ("net.minecraftforge", "10.13.4.1614"),
];

/// Inputs for one publish run
#[derive(Debug, Clone, Default)]
pub struct PublishConfig {
    pub project_id: Option<String>,
    pub version_name: Option<String>,
    pub base_download_url: Option<String>,
    /// Root holding `common/`, `server/` and `client/`
    pub source_dir: Option<PathBuf>,
    pub common_dir: Option<PathBuf>,
    pub server_dir: Option<PathBuf>,
    pub client_dir: Option<PathBuf>,
    pub libraries: BTreeMap<String, String>,
    pub changelog: Option<PathBuf>,

    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub secret_id: Option<String>,
    pub secret_key: Option<String>,

    pub worker_count: Option<usize>,
    pub max_retries: Option<usize>,
    pub timeout: Option<Duration>,
}

impl PublishConfig {
    /// Load `.env`, then read every `MODPACK_*` variable
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Ignore error if .env not present
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let libraries = match get(ENV_LIBRARIES) {
            Some(raw) => parse_libraries(&raw)?,
            None => DEFAULT_LIBRARIES
                .iter()
                .map(|(name, version)| (name.to_string(), version.to_string()))
                .collect(),
        };

        Ok(Self {
            project_id: get(ENV_PROJECT_ID),
            version_name: get(ENV_VERSION),
            base_download_url: get(ENV_BASE_URL),
            source_dir: get(ENV_SOURCE_DIR).map(PathBuf::from),
            common_dir: get(ENV_COMMON_DIR).map(PathBuf::from),
            server_dir: get(ENV_SERVER_DIR).map(PathBuf::from),
            client_dir: get(ENV_CLIENT_DIR).map(PathBuf::from),
            libraries,
            changelog: get(ENV_CHANGELOG).map(PathBuf::from),
            endpoint: get(ENV_ENDPOINT),
            bucket: get(ENV_BUCKET),
            region: get(ENV_REGION),
            secret_id: get(ENV_SECRET_ID),
            secret_key: get(ENV_SECRET_KEY),
            worker_count: parse_number(get(ENV_WORKERS), ENV_WORKERS)?,
            max_retries: parse_number(get(ENV_MAX_RETRIES), ENV_MAX_RETRIES)?,
            timeout: parse_number::<u64>(get(ENV_TIMEOUT_SECS), ENV_TIMEOUT_SECS)?.map(Duration::from_secs),
        })
    }

    /// Source directories, with per-category overrides applied
    pub fn source_dirs(&self) -> Result<SourceDirs> {
        let resolve = |dir: &Option<PathBuf>, category: Category| {
            dir.clone()
                .or_else(|| self.source_dir.as_ref().map(|root| root.join(category.as_str())))
                .ok_or_else(|| missing("source_dir", ENV_SOURCE_DIR))
        };

        Ok(SourceDirs {
            common: resolve(&self.common_dir, Category::Common)?,
            server: resolve(&self.server_dir, Category::Server)?,
            client: resolve(&self.client_dir, Category::Client)?,
        })
    }

    pub fn publish_request(&self) -> Result<PublishRequest> {
        let project_id = required(&self.project_id, "project_id", ENV_PROJECT_ID)?;
        let version_name = required(&self.version_name, "version_name", ENV_VERSION)?;
        let base_download_url = required(&self.base_download_url, "base_download_url", ENV_BASE_URL)?;

        let mut request = PublishRequest::new(project_id, version_name, base_download_url, self.source_dirs()?);
        request.libraries = self.libraries.clone();
        request.changelog = self.changelog.clone();
        Ok(request)
    }

    pub fn upload_config(&self) -> Result<UploadConfig> {
        let mut builder = UploadConfig::builder();
        if let Some(workers) = self.worker_count {
            builder = builder.worker_count(workers);
        }
        if let Some(max_retries) = self.max_retries {
            builder = builder.max_retries(max_retries);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }

    /// Settings for the HTTP object store
    pub fn storage_settings(&self, upload: &UploadConfig) -> Result<StorageSettings> {
        let bucket = required(&self.bucket, "bucket", ENV_BUCKET)?;
        let region = required(&self.region, "region", ENV_REGION)?;

        let mut settings = StorageSettings::new(bucket, region).with_timeout(upload.timeout);
        settings.user_agent = upload.user_agent.clone();
        if let Some(endpoint) = &self.endpoint {
            settings = settings.with_endpoint(endpoint.clone());
        }
        match (&self.secret_id, &self.secret_key) {
            (Some(id), Some(key)) => settings = settings.with_credentials(id.clone(), key.clone()),
            (None, None) => {}
            _ => {
                return Err(PublishError::configuration(
                    "secret id and secret key must be set together",
                    "secret_key",
                    format!("Set both {} and {}", ENV_SECRET_ID, ENV_SECRET_KEY),
                ));
            }
        }
        Ok(settings)
    }
}

/// Parse `name=version` pairs separated by commas
pub fn parse_libraries(raw: &str) -> Result<BTreeMap<String, String>> {
    let mut libraries = BTreeMap::new();

    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let parsed = pair
            .split_once('=')
            .map(|(name, version)| (name.trim(), version.trim()))
            .filter(|(name, version)| !name.is_empty() && !version.is_empty());

        let Some((name, version)) = parsed else {
            return Err(PublishError::configuration(
                format!("invalid library entry '{}'", pair),
                "libraries",
                format!("Use {}=name=version,name=version", ENV_LIBRARIES),
            ));
        };
        libraries.insert(name.to_string(), version.to_string());
    }

    Ok(libraries)
}

fn required(value: &Option<String>, field: &str, env: &str) -> Result<String> {
    value.clone().ok_or_else(|| missing(field, env))
}

fn missing(field: &str, env: &str) -> PublishError {
    PublishError::configuration(
        format!("{} is not set", field),
        field,
        format!("Set {} in your environment or .env file", env),
    )
}

fn parse_number<T: std::str::FromStr>(value: Option<String>, env: &str) -> Result<Option<T>> {
    value
        .map(|raw| {
            raw.parse::<T>().map_err(|_| {
                PublishError::configuration(
                    format!("{} must be a non-negative integer, got '{}'", env, raw),
                    env,
                    format!("Fix {} in your environment or .env file", env),
                )
            })
        })
        .transpose()
}
