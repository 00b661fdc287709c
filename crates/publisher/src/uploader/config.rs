//! Configuration types for the upload pipeline

use std::time::Duration;

use crate::uploader::core::{PublishError, Result};

/// Configuration for upload operations
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Total attempts per remote operation (3 means at most 3 calls)
    pub max_retries: usize,
    /// Initial delay between retries (doubles each retry)
    pub retry_delay: Duration,
    /// Maximum retry delay cap
    pub max_retry_delay: Duration,
    /// Number of pool workers running upload tasks
    pub worker_count: usize,
    /// How long in-flight tasks may run after a failure before being aborted
    pub shutdown_grace: Duration,
    /// Timeout for each storage request
    pub timeout: Duration,
    pub user_agent: String,
}

impl UploadConfig {
    pub fn builder() -> UploadConfigBuilder {
        UploadConfigBuilder::new()
    }

    /// Pool size derived from hardware parallelism
    pub fn default_worker_count() -> usize {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        (parallelism * 2).max(1)
    }

    /// Calculate retry delay for the given retry index using exponential backoff
    pub fn get_retry_delay(&self, retry: usize) -> Duration {
        let factor = 2_u32.saturating_pow(retry.min(16) as u32);
        self.retry_delay.saturating_mul(factor).min(self.max_retry_delay)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(PublishError::configuration(
                "max_retries must allow at least one attempt",
                "max_retries",
                "Use 1 to disable retries",
            ));
        }
        if self.worker_count == 0 {
            return Err(PublishError::configuration(
                "worker_count must be at least 1",
                "worker_count",
                "Leave unset to use twice the available parallelism",
            ));
        }
        Ok(())
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(1000), // Start with 1 second
            max_retry_delay: Duration::from_secs(60), // Cap at 1 minute
            worker_count: Self::default_worker_count(),
            shutdown_grace: Duration::from_secs(30),
            timeout: Duration::from_secs(30),
            user_agent: concat!("modpack-publisher/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Builder for [`UploadConfig`]
#[derive(Debug, Clone, Default)]
pub struct UploadConfigBuilder {
    config: UploadConfig,
}

impl UploadConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.config.max_retry_delay = delay;
        self
    }

    pub fn worker_count(mut self, workers: usize) -> Self {
        self.config.worker_count = workers;
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> Result<UploadConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UploadConfig::default();
        assert_eq!(config.max_retries, 3);
        assert!(config.worker_count >= 2);
        assert_eq!(config.worker_count % 2, 0);
    }

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        let config = UploadConfig::builder()
            .retry_delay(Duration::from_millis(100))
            .max_retry_delay(Duration::from_millis(500))
            .build()
            .unwrap();

        assert_eq!(config.get_retry_delay(0), Duration::from_millis(100));
        assert_eq!(config.get_retry_delay(1), Duration::from_millis(200));
        assert_eq!(config.get_retry_delay(2), Duration::from_millis(400));
        assert_eq!(config.get_retry_delay(3), Duration::from_millis(500));
        assert_eq!(config.get_retry_delay(40), Duration::from_millis(500));
    }

    #[test]
    fn test_builder_rejects_zero_attempts_and_workers() {
        assert!(matches!(
            UploadConfig::builder().max_retries(0).build(),
            Err(PublishError::Configuration { .. })
        ));
        assert!(matches!(
            UploadConfig::builder().worker_count(0).build(),
            Err(PublishError::Configuration { .. })
        ));
    }
}
