//! Sync state machine for a prompt session.

use thiserror::Error;
use tracing::debug;

/// States a session occupies between construction and shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Session constructed; nothing loaded yet.
    Uninitialized,
    /// Reading the local cache.
    LoadingCache,
    /// Cached prompts are displayed; remote not yet consulted.
    ReadyLocal,
    /// A remote fetch and reconcile is in progress.
    Syncing,
    /// The displayed collection reflects the latest successful sync.
    ReadyMerged,
    /// Prompts are available but the last sync failed.
    Degraded,
    /// The last sync failed and there is nothing to show.
    Failed,
}

impl SyncState {
    /// Returns `true` when a collection can be displayed.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::ReadyLocal | Self::ReadyMerged | Self::Degraded)
    }

    /// Returns `true` when the last sync attempt failed.
    #[must_use]
    pub const fn has_error(self) -> bool {
        matches!(self, Self::Degraded | Self::Failed)
    }
}

/// Events that drive [`SyncMachine`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// Begin reading the local cache.
    LoadCache,
    /// The cache yielded at least one prompt.
    CacheLoaded,
    /// Begin a remote fetch.
    BeginSync,
    /// Fetch and reconcile completed.
    SyncSucceeded,
    /// Fetch failed.
    SyncFailed {
        /// Whether a collection is still available to display.
        has_data: bool,
    },
}

/// Tracks the current [`SyncState`].
#[derive(Debug, Clone, Copy)]
pub struct SyncMachine {
    state: SyncState,
}

impl SyncMachine {
    /// Creates a machine in [`SyncState::Uninitialized`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SyncState::Uninitialized,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SyncState {
        self.state
    }

    /// Applies an event, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidTransition`] when the event is not
    /// allowed from the current state.
    pub fn apply(&mut self, event: SyncEvent) -> StateResult<SyncState> {
        let next = match (self.state, event) {
            (SyncState::Uninitialized, SyncEvent::LoadCache) => Some(SyncState::LoadingCache),
            (SyncState::LoadingCache, SyncEvent::CacheLoaded) => Some(SyncState::ReadyLocal),
            // Syncing is accepted so a cycle whose future was dropped can restart.
            (
                SyncState::LoadingCache
                | SyncState::ReadyLocal
                | SyncState::Syncing
                | SyncState::ReadyMerged
                | SyncState::Degraded
                | SyncState::Failed,
                SyncEvent::BeginSync,
            ) => Some(SyncState::Syncing),
            (SyncState::Syncing, SyncEvent::SyncSucceeded) => Some(SyncState::ReadyMerged),
            (SyncState::Syncing, SyncEvent::SyncFailed { has_data: true }) => {
                Some(SyncState::Degraded)
            }
            (SyncState::Syncing, SyncEvent::SyncFailed { has_data: false }) => {
                Some(SyncState::Failed)
            }
            _ => None,
        };

        let Some(next_state) = next else {
            return Err(StateError::InvalidTransition {
                from: self.state,
                event,
            });
        };

        if next_state != self.state {
            debug!(?self.state, ?next_state, ?event, "sync state transition");
            self.state = next_state;
        }

        Ok(self.state)
    }
}

impl Default for SyncMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors emitted by the state machine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    /// Transition was not permitted from the current state.
    #[error("invalid sync transition from {from:?} via {event:?}")]
    InvalidTransition {
        /// State prior to the attempted transition.
        from: SyncState,
        /// Event that was rejected.
        event: SyncEvent,
    },
}

/// Result alias for state machine operations.
pub type StateResult<T> = Result<T, StateError>;
