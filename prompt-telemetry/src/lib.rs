//! Observability utilities for promptsync.
//!
//! Installs a `tracing-subscriber` formatter filtered by `RUST_LOG`, falling
//! back to a configurable default directive.

#![warn(missing_docs, clippy::pedantic)]

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The default filter directive did not parse.
    #[error("invalid log directive `{directive}`: {reason}")]
    Directive {
        /// Directive as supplied.
        directive: String,
        /// Parser message.
        reason: String,
    },
    /// A global subscriber was already installed.
    #[error("tracing subscriber already installed: {0}")]
    AlreadyInstalled(String),
}

/// Formatter settings.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    default_directive: String,
    with_target: bool,
}

impl TelemetryConfig {
    /// Creates a configuration with the supplied fallback directive.
    #[must_use]
    pub fn new(default_directive: impl Into<String>) -> Self {
        Self {
            default_directive: default_directive.into(),
            with_target: false,
        }
    }

    /// Includes the event target (module path) in each line.
    #[must_use]
    pub fn with_target(mut self, with_target: bool) -> Self {
        self.with_target = with_target;
        self
    }

    /// Builds the filter: `RUST_LOG` when set, otherwise the default directive.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Directive`] when the default does not parse.
    pub fn filter(&self) -> Result<EnvFilter, TelemetryError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.default_directive).map_err(|err| TelemetryError::Directive {
            directive: self.default_directive.clone(),
            reason: err.to_string(),
        })
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::new("info,prompt_sync=info,prompt_remote=warn")
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or a subscriber is
/// already installed.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    tracing_subscriber::fmt()
        .with_env_filter(config.filter()?)
        .with_target(config.with_target)
        .try_init()
        .map_err(|err| TelemetryError::AlreadyInstalled(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directive_parses() {
        assert!(TelemetryConfig::default().filter().is_ok());
    }

    #[test]
    fn second_install_reports_error() {
        let config = TelemetryConfig::default();
        let _ = init_tracing(&config);
        assert!(matches!(
            init_tracing(&config),
            Err(TelemetryError::AlreadyInstalled(_))
        ));
    }
}
