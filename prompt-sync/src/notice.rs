//! Events broadcast to presentation surfaces.

use prompt_primitives::PromptId;

use crate::error::SyncErrorKind;
use crate::lifecycle::SyncState;

/// Which local mutation a remote write carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A prompt was created.
    Create,
    /// A prompt was deleted.
    Delete,
}

/// Notification emitted by a [`SyncSession`](crate::SyncSession).
///
/// Receivers that fall behind the channel capacity miss the oldest notices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNotice {
    /// Cached prompts are ready for display.
    Loaded {
        /// Number of cached prompts.
        prompts: usize,
    },
    /// A sync completed. Background syncs only report when `changed`.
    Synced {
        /// Whether the displayed collection changed.
        changed: bool,
        /// Size of the collection after the sync.
        prompts: usize,
    },
    /// A sync failed; `state` tells whether prompts are still shown.
    SyncFailed {
        /// Failure category.
        kind: SyncErrorKind,
        /// Human-readable detail.
        message: String,
        /// Session state after the failure.
        state: SyncState,
    },
    /// A local mutation reached the remote store.
    RemoteWritten {
        /// Mutation kind.
        change: ChangeKind,
        /// Prompt affected.
        id: PromptId,
    },
    /// A local mutation could not be propagated. The local change stands.
    RemoteWriteFailed {
        /// Mutation kind.
        change: ChangeKind,
        /// Prompt affected.
        id: PromptId,
        /// Failure category.
        kind: SyncErrorKind,
        /// Human-readable detail.
        message: String,
    },
    /// Prompt text was handed to the injector.
    Injected {
        /// Prompt inserted.
        id: PromptId,
        /// Whether the injector reported success.
        success: bool,
        /// Delivery method reported by the injector.
        method: String,
    },
}
