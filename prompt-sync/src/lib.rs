//! Sync orchestration for promptsync.
//!
//! [`SyncSession`] keeps an in-memory prompt collection, a local cache, and a
//! remote document in step: cache first for instant display, then a
//! reconcile against the remote copy ([`reconcile`]), optimistic local
//! mutations with background remote writes, and an optional periodic sync
//! ([`PeriodicSync`]).

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod inject;
mod lifecycle;
mod notice;
mod periodic;
mod queue;
mod reconciler;
mod session;

pub use error::{SyncError, SyncErrorKind, SyncResult, remote_kind};
pub use inject::{InjectionOutcome, TextInjector};
pub use lifecycle::{StateError, StateResult, SyncEvent, SyncMachine, SyncState};
pub use notice::{ChangeKind, SyncNotice};
pub use periodic::PeriodicSync;
pub use reconciler::reconcile;
pub use session::{
    DEFAULT_SYNC_INTERVAL, Mutation, Propagation, PropagationOutcome, RefreshOutcome, SyncSession,
    SyncSessionBuilder,
};
