//! HTTP object storage backend for S3/COS-compatible buckets

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, info_span, Instrument};
use url::Url;

use super::{ObjectInfo, ObjectMetadata, ObjectStore, StorageError, StorageResult, validate_key};

/// Default prefix for user metadata headers (Tencent COS convention)
pub const DEFAULT_METADATA_PREFIX: &str = "x-cos-meta-";

const CONTENT_HASH_FIELD: &str = "content-hash";
const COMPRESSED_FIELD: &str = "compressed";

/// Connection settings for a bucket
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Explicit bucket endpoint; derived from bucket and region when absent
    pub endpoint: Option<String>,
    pub bucket: String,
    pub region: String,
    pub secret_id: Option<String>,
    pub secret_key: Option<String>,
    /// Prefix used for user metadata headers
    pub metadata_prefix: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl StorageSettings {
    pub fn new<B: Into<String>, R: Into<String>>(bucket: B, region: R) -> Self {
        Self {
            endpoint: None,
            bucket: bucket.into(),
            region: region.into(),
            secret_id: None,
            secret_key: None,
            metadata_prefix: DEFAULT_METADATA_PREFIX.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: concat!("modpack-publisher/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_credentials<I: Into<String>, K: Into<String>>(mut self, secret_id: I, secret_key: K) -> Self {
        self.secret_id = Some(secret_id.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve the bucket base URL, always ending in `/`
    pub fn endpoint_url(&self) -> StorageResult<Url> {
        let raw = match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://{}.cos.{}.myqcloud.com", self.bucket, self.region),
        };
        let normalized = if raw.ends_with('/') { raw } else { format!("{}/", raw) };

        Url::parse(&normalized).map_err(|e| StorageError::Client {
            reason: format!("invalid endpoint '{}': {}", normalized, e),
        })
    }
}

/// Object store speaking plain HTTP verbs against a bucket endpoint
///
/// `HEAD` answers `stat`, `GET` answers `get_object` and `PUT` uploads.
/// Identity and compression flags travel as user metadata headers.
/// Credentials, when configured, are sent as HTTP basic auth; request
/// signing is expected to happen in a gateway in front of the bucket.
pub struct HttpObjectStore {
    client: Client,
    endpoint: Url,
    credentials: Option<(String, String)>,
    metadata_prefix: String,
}

impl HttpObjectStore {
    pub fn new(settings: StorageSettings) -> StorageResult<Self> {
        let endpoint = settings.endpoint_url()?;
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(&settings.user_agent)
            .build()
            .map_err(|e| StorageError::Client {
                reason: format!("failed to create HTTP client: {}", e),
            })?;
        let credentials = match (settings.secret_id, settings.secret_key) {
            (Some(id), Some(key)) => Some((id, key)),
            _ => None,
        };

        Ok(Self {
            client,
            endpoint,
            credentials,
            metadata_prefix: settings.metadata_prefix.to_ascii_lowercase(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn object_url(&self, key: &str) -> StorageResult<Url> {
        validate_key(key)?;
        // Each key segment is appended as a literal path segment so `#`, `?`
        // and `%` in file names are percent-encoded rather than interpreted.
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidKey {
                key: key.to_string(),
                reason: format!("endpoint {} cannot carry a path", self.endpoint),
            })?
            .pop_if_empty()
            .extend(key.split('/'));
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.credentials {
            Some((id, key)) => builder.basic_auth(id, Some(key)),
            None => builder,
        }
    }

    fn header_name(&self, field: &str) -> String {
        format!("{}{}", self.metadata_prefix, field)
    }

    async fn send(&self, key: &str, url: &Url, builder: RequestBuilder) -> StorageResult<Response> {
        builder
            .send()
            .await
            .map_err(|e| StorageError::from_reqwest(key, url.as_str(), e))
    }

    fn object_info(&self, headers: &HeaderMap) -> ObjectInfo {
        let size = headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(0);
        let content_hash = headers
            .get(self.header_name(CONTENT_HASH_FIELD).as_str())
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        ObjectInfo { size, content_hash }
    }
}

fn status_error(key: &str, status: StatusCode) -> StorageError {
    StorageError::Status {
        key: key.to_string(),
        status: status.as_u16(),
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn stat(&self, key: &str) -> StorageResult<Option<ObjectInfo>> {
        let url = self.object_url(key)?;
        debug!("HEAD {}", url);
        let response = self.send(key, &url, self.request(Method::HEAD, url.clone())).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(self.object_info(response.headers()))),
            status => Err(status_error(key, status)),
        }
    }

    async fn get_object(&self, key: &str) -> StorageResult<Option<Bytes>> {
        let url = self.object_url(key)?;
        let span = info_span!("get_object", key);

        async {
            debug!("GET {}", url);
            let response = self.send(key, &url, self.request(Method::GET, url.clone())).await?;

            match response.status() {
                StatusCode::NOT_FOUND => return Ok(None),
                status if !status.is_success() => return Err(status_error(key, status)),
                _ => {}
            }

            let mut body = BytesMut::new();
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| StorageError::from_reqwest(key, url.as_str(), e))?;
                body.extend_from_slice(&chunk);
            }
            debug!(size = body.len(), "fetched object");

            Ok::<_, StorageError>(Some(body.freeze()))
        }
        .instrument(span)
        .await
    }

    async fn upload(
        &self,
        data: Bytes,
        key: &str,
        overwrite: bool,
        metadata: &ObjectMetadata,
    ) -> StorageResult<()> {
        let url = self.object_url(key)?;
        debug!(size = data.len(), overwrite, "PUT {}", url);

        let mut builder = self
            .request(Method::PUT, url.clone())
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(self.header_name(COMPRESSED_FIELD), metadata.compressed.to_string());
        if let Some(hash) = &metadata.content_hash {
            builder = builder.header(self.header_name(CONTENT_HASH_FIELD), hash.as_str());
        }
        if !overwrite {
            builder = builder.header("If-None-Match", "*");
        }

        let response = self.send(key, &url, builder.body(data)).await?;
        match response.status() {
            StatusCode::PRECONDITION_FAILED => Err(StorageError::AlreadyExists {
                key: key.to_string(),
            }),
            status if status.is_success() => Ok(()),
            status => Err(status_error(key, status)),
        }
    }

    async fn shutdown(&self) {
        debug!(endpoint = %self.endpoint, "HTTP object store shut down");
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
