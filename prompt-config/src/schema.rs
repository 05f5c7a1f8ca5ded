//! Strongly typed configuration schema.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

/// Settings for a prompt synchronisation session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Name of the remote container holding the document.
    pub container_name: String,
    /// Name of the remote document holding the collection.
    pub document_name: String,
    /// Base URL for metadata and download calls.
    pub api_base_url: String,
    /// Base URL for media uploads.
    pub upload_base_url: String,
    /// Per-request transport timeout, in seconds.
    pub request_timeout_secs: u64,
    /// Attempts per remote operation, including the first.
    pub retry_attempts: u32,
    /// Base backoff delay, in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Interval between background syncs, in seconds.
    pub sync_interval_secs: u64,
    /// Location of the local cache file.
    pub cache_path: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            container_name: "PromptManager".to_owned(),
            document_name: "prompts.json".to_owned(),
            api_base_url: "https://www.googleapis.com/".to_owned(),
            upload_base_url: "https://www.googleapis.com/upload/".to_owned(),
            request_timeout_secs: 30,
            retry_attempts: 3,
            retry_base_delay_ms: 1_000,
            sync_interval_secs: 300,
            cache_path: PathBuf::from("prompts-cache.json"),
        }
    }
}

impl SyncConfig {
    /// Returns the transport timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Returns the base retry delay.
    #[must_use]
    pub const fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Returns the background sync interval.
    #[must_use]
    pub const fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    /// Returns the cache file location.
    #[must_use]
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a name is blank, a duration or
    /// attempt count is zero, or a base URL lacks an http(s) scheme.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.container_name.trim().is_empty() {
            return Err(ConfigError::Invalid("container name cannot be empty"));
        }
        if self.document_name.trim().is_empty() {
            return Err(ConfigError::Invalid("document name cannot be empty"));
        }
        if !is_http_url(&self.api_base_url) {
            return Err(ConfigError::Invalid(
                "api base URL must start with http:// or https://",
            ));
        }
        if !is_http_url(&self.upload_base_url) {
            return Err(ConfigError::Invalid(
                "upload base URL must start with http:// or https://",
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request timeout must be greater than zero",
            ));
        }
        if self.retry_attempts == 0 {
            return Err(ConfigError::Invalid("retry attempts must be at least one"));
        }
        if self.retry_base_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "retry base delay must be greater than zero",
            ));
        }
        if self.sync_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sync interval must be greater than zero",
            ));
        }
        if self.cache_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("cache path cannot be empty"));
        }
        Ok(())
    }
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://")
}
