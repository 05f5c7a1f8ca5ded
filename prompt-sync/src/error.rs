//! Error taxonomy surfaced by a sync session.

use prompt_cache::CacheError;
use prompt_primitives::PromptId;
use prompt_remote::traits::RemoteError;
use thiserror::Error;

use crate::lifecycle::StateError;

/// Coarse failure categories shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorKind {
    /// Network or service failure; a later attempt may succeed.
    Transport,
    /// The user must (re)authenticate.
    Credential,
    /// Remote or cached data had an unexpected shape.
    Decode,
    /// Input was rejected before anything was written.
    Validation,
    /// The local cache could not be read or written.
    Storage,
    /// The request did not fit the session's current state.
    Usage,
}

/// Errors returned by [`SyncSession`](crate::SyncSession) operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Draft failed validation.
    #[error(transparent)]
    Validation(#[from] prompt_primitives::Error),
    /// Remote store failure.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// Local cache failure.
    #[error("local cache: {0}")]
    Cache(#[from] CacheError),
    /// Rejected state transition.
    #[error(transparent)]
    State(#[from] StateError),
    /// No prompt with the given identity is loaded.
    #[error("prompt {0} not found")]
    NotFound(PromptId),
    /// No text injector was configured.
    #[error("no text injector configured")]
    InjectorUnavailable,
    /// The session has not loaded its cache yet.
    #[error("session not started")]
    NotStarted,
    /// The session has been closed.
    #[error("session closed")]
    Closed,
    /// A required builder component was not supplied.
    #[error("session misconfigured: {0}")]
    Configuration(&'static str),
}

impl SyncError {
    /// Classifies the error for display.
    #[must_use]
    pub const fn kind(&self) -> SyncErrorKind {
        match self {
            Self::Validation(_) => SyncErrorKind::Validation,
            Self::Remote(err) => remote_kind(err),
            Self::Cache(CacheError::Io { .. }) => SyncErrorKind::Storage,
            Self::Cache(CacheError::Serialization { .. }) => SyncErrorKind::Decode,
            Self::State(_)
            | Self::NotFound(_)
            | Self::InjectorUnavailable
            | Self::NotStarted
            | Self::Closed
            | Self::Configuration(_) => SyncErrorKind::Usage,
        }
    }
}

/// Maps a remote failure onto the user-facing taxonomy.
#[must_use]
pub const fn remote_kind(err: &RemoteError) -> SyncErrorKind {
    match err {
        RemoteError::Credential { .. } => SyncErrorKind::Credential,
        RemoteError::Decode { .. } => SyncErrorKind::Decode,
        RemoteError::Configuration { .. } => SyncErrorKind::Usage,
        RemoteError::Transport { .. } | RemoteError::Status { .. } | RemoteError::NotFound { .. } => {
            SyncErrorKind::Transport
        }
    }
}

/// Result alias for session operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_failures_are_classified() {
        assert_eq!(
            SyncError::from(RemoteError::credential("expired")).kind(),
            SyncErrorKind::Credential
        );
        assert_eq!(
            SyncError::from(RemoteError::Status {
                status: 503,
                reason: "busy".into()
            })
            .kind(),
            SyncErrorKind::Transport
        );
        assert_eq!(
            SyncError::from(RemoteError::decode("not an array")).kind(),
            SyncErrorKind::Decode
        );
    }

    #[test]
    fn validation_and_usage_kinds() {
        let err = SyncError::from(prompt_primitives::Error::MissingField { field: "name" });
        assert_eq!(err.kind(), SyncErrorKind::Validation);
        assert_eq!(
            SyncError::NotFound(PromptId::from_millis(1)).kind(),
            SyncErrorKind::Usage
        );
    }

    #[test]
    fn cache_io_is_storage() {
        let err = SyncError::from(CacheError::from(std::io::Error::other("disk full")));
        assert_eq!(err.kind(), SyncErrorKind::Storage);
    }
}
