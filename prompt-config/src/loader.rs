//! Configuration loader: defaults, JSON file, environment overrides.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::SyncConfig;

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "PROMPTSYNC_";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File that failed to load.
        path: PathBuf,
        /// Source [`std::io::Error`].
        source: std::io::Error,
    },
    /// The configuration file is not valid JSON for [`SyncConfig`].
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Source [`serde_json::Error`].
        source: serde_json::Error,
    },
    /// An environment override carried an unparsable value.
    #[error("invalid value for {key}: `{value}`")]
    Env {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
    /// The resulting configuration failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Layered loader for [`SyncConfig`].
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: SyncConfig,
}

impl ConfigLoader {
    /// Starts from the built-in defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current settings with the contents of a JSON file.
    ///
    /// Keys missing from the file keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn with_file(mut self, path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.config = serde_json::from_slice(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(self)
    }

    /// Like [`ConfigLoader::with_file`], but a missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the file exists but is malformed.
    pub fn with_optional_file(self, path: impl AsRef<Path>) -> ConfigResult<Self> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Applies `PROMPTSYNC_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] when a numeric override does not parse.
    pub fn with_env(self) -> ConfigResult<Self> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides resolved through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] when a numeric override does not parse.
    pub fn with_env_from<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            let key = format!("{ENV_PREFIX}{name}");
            lookup(&key).map(|value| (key, value))
        };

        if let Some((_, value)) = var("CONTAINER_NAME") {
            self.config.container_name = value;
        }
        if let Some((_, value)) = var("DOCUMENT_NAME") {
            self.config.document_name = value;
        }
        if let Some((_, value)) = var("API_BASE_URL") {
            self.config.api_base_url = value;
        }
        if let Some((_, value)) = var("UPLOAD_BASE_URL") {
            self.config.upload_base_url = value;
        }
        if let Some((_, value)) = var("CACHE_PATH") {
            self.config.cache_path = PathBuf::from(value);
        }
        if let Some((key, value)) = var("REQUEST_TIMEOUT_SECS") {
            self.config.request_timeout_secs = parse(key, &value)?;
        }
        if let Some((key, value)) = var("RETRY_ATTEMPTS") {
            self.config.retry_attempts = parse(key, &value)?;
        }
        if let Some((key, value)) = var("RETRY_BASE_DELAY_MS") {
            self.config.retry_base_delay_ms = parse(key, &value)?;
        }
        if let Some((key, value)) = var("SYNC_INTERVAL_SECS") {
            self.config.sync_interval_secs = parse(key, &value)?;
        }
        Ok(self)
    }

    /// Validates and returns the assembled configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when validation fails.
    pub fn load(self) -> ConfigResult<SyncConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn parse<T: FromStr>(key: String, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        key,
        value: value.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn temp_file(contents: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("promptsync-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn env_overrides_defaults() {
        let config = ConfigLoader::new()
            .with_env_from(env(&[
                ("PROMPTSYNC_DOCUMENT_NAME", "team.json"),
                ("PROMPTSYNC_SYNC_INTERVAL_SECS", "60"),
            ]))
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.document_name, "team.json");
        assert_eq!(config.sync_interval_secs, 60);
    }

    #[test]
    fn bad_numeric_override_names_the_key() {
        let err = ConfigLoader::new()
            .with_env_from(env(&[("PROMPTSYNC_RETRY_ATTEMPTS", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("PROMPTSYNC_RETRY_ATTEMPTS"));
    }

    #[test]
    fn env_is_applied_after_file() {
        let path = temp_file(r#"{"container_name": "FromFile", "retry_attempts": 5}"#);
        let config = ConfigLoader::new()
            .with_file(&path)
            .unwrap()
            .with_env_from(env(&[("PROMPTSYNC_CONTAINER_NAME", "FromEnv")]))
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.container_name, "FromEnv");
        assert_eq!(config.retry_attempts, 5);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_optional_file_keeps_defaults() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/promptsync.json")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn load_validates() {
        let err = ConfigLoader::new()
            .with_env_from(env(&[("PROMPTSYNC_RETRY_ATTEMPTS", "0")]))
            .unwrap()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
