//! Shared remote-store traits and error types.

use std::{env, fmt};

use async_trait::async_trait;
use bytes::Bytes;
use prompt_primitives::Collection;
use thiserror::Error;

/// Result alias used by remote store components.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Environment variable consulted by [`StaticCredentials::from_env`].
pub const TOKEN_ENV: &str = "PROMPTSYNC_TOKEN";

/// Error type shared by remote store implementations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The credential provider could not produce a token.
    #[error("credential error: {reason}")]
    Credential {
        /// Additional context for the failure.
        reason: String,
    },

    /// The client is misconfigured (bad base URL, unusable identifier) or the
    /// local collection cannot be encoded.
    #[error("remote store not configured: {reason}")]
    Configuration {
        /// Additional context for the failure.
        reason: String,
    },

    /// Transport-level failures (connect, timeout, protocol).
    #[error("remote transport error: {reason}")]
    Transport {
        /// Additional context about the error.
        reason: String,
    },

    /// The service answered with a non-success status other than 404.
    #[error("remote store returned {status}: {reason}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or other context.
        reason: String,
    },

    /// The addressed container or document does not exist.
    #[error("remote resource not found: {resource}")]
    NotFound {
        /// Description of the missing resource.
        resource: String,
    },

    /// A response body could not be decoded into the expected shape.
    #[error("remote data could not be decoded: {reason}")]
    Decode {
        /// Decoder context.
        reason: String,
    },
}

impl RemoteError {
    /// Convenience constructor for credential failures.
    #[must_use]
    pub fn credential(reason: impl Into<String>) -> Self {
        Self::Credential {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for configuration issues.
    #[must_use]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for transport failures.
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for missing resources.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Convenience constructor for decode failures.
    #[must_use]
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    /// Returns `true` for failures worth retrying: transport and server status errors.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Status { .. })
    }
}

/// Bearer token handed to the document service on every call.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wraps a raw token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Formats the value of an `Authorization` header.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// External source of bearer credentials.
///
/// Implementations own their own caching and consent policy; callers never
/// retry a failed acquisition.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Returns a token or a [`RemoteError::Credential`].
    async fn token(&self) -> RemoteResult<BearerToken>;
}

/// Credential provider returning a fixed token.
#[derive(Clone, Default)]
pub struct StaticCredentials {
    token: Option<BearerToken>,
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("configured", &self.token.is_some())
            .finish()
    }
}

impl StaticCredentials {
    /// Creates a provider that always returns `token`.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(BearerToken::new(token)),
        }
    }

    /// Loads the token from the `PROMPTSYNC_TOKEN` environment variable.
    ///
    /// A missing variable is reported lazily, when a token is first requested.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            token: env::var(TOKEN_ENV)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(BearerToken::new),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn token(&self) -> RemoteResult<BearerToken> {
        self.token
            .clone()
            .ok_or_else(|| RemoteError::credential(format!("no token configured ({TOKEN_ENV})")))
    }
}

/// Low-level document service: name search, creation, and whole-body transfer.
///
/// Containers are folders; documents are files with a single parent
/// container. Search only considers entries that are not trashed.
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Finds a container by exact name.
    async fn find_container(&self, token: &BearerToken, name: &str) -> RemoteResult<Option<String>>;

    /// Creates a container and returns its identifier.
    async fn create_container(&self, token: &BearerToken, name: &str) -> RemoteResult<String>;

    /// Finds a document by exact name inside `container_id`.
    async fn find_document(
        &self,
        token: &BearerToken,
        container_id: &str,
        name: &str,
    ) -> RemoteResult<Option<String>>;

    /// Creates an empty document inside `container_id` and returns its identifier.
    async fn create_document(
        &self,
        token: &BearerToken,
        container_id: &str,
        name: &str,
    ) -> RemoteResult<String>;

    /// Reads the full document body.
    async fn read_document(&self, token: &BearerToken, document_id: &str) -> RemoteResult<Bytes>;

    /// Replaces the full document body.
    async fn replace_document(
        &self,
        token: &BearerToken,
        document_id: &str,
        body: Bytes,
    ) -> RemoteResult<()>;
}

/// Whole-collection view of the remote replica.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns the complete remote collection; a missing document reads as empty.
    async fn fetch_collection(&self) -> RemoteResult<Collection>;

    /// Overwrites the remote document with `collection`.
    async fn write_collection(&self, collection: &Collection) -> RemoteResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_and_status_are_retryable() {
        assert!(RemoteError::transport("reset").is_retryable());
        assert!(
            RemoteError::Status {
                status: 503,
                reason: "busy".into()
            }
            .is_retryable()
        );
        assert!(!RemoteError::credential("denied").is_retryable());
        assert!(!RemoteError::decode("bad").is_retryable());
        assert!(!RemoteError::not_found("file").is_retryable());
        assert!(!RemoteError::configuration("url").is_retryable());
    }

    #[test]
    fn token_debug_is_redacted() {
        let token = BearerToken::new("secret");
        assert!(!format!("{token:?}").contains("secret"));
        assert_eq!(token.header_value(), "Bearer secret");
    }

    #[tokio::test]
    async fn empty_static_credentials_fail() {
        let err = StaticCredentials::default().token().await.unwrap_err();
        assert!(matches!(err, RemoteError::Credential { .. }));
    }
}
