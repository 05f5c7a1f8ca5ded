//! Error types for the local cache.

use serde_json::Error as SerdeError;
use thiserror::Error;

/// Errors emitted by cache implementations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Underlying I/O failure while reading or writing the cache file.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// Serialization or deserialization error.
    #[error("serialization error: {source}")]
    Serialization {
        /// Source [`serde_json::Error`].
        #[from]
        source: SerdeError,
    },
}

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
