//! Offline-first prompt library facade.
//!
//! Bundles the promptsync crates behind feature flags so downstream users can
//! pull in only the layers they need: the sync session alone, or just the
//! remote client or cache.

#![warn(missing_docs, clippy::pedantic)]

/// Prompt records, identities, and collections.
pub use prompt_primitives as primitives;

/// Sync session and reconciler (enabled by `sync` feature).
#[cfg(feature = "sync")]
pub use prompt_sync as sync;

/// Remote document store client (enabled by `remote` feature).
#[cfg(feature = "remote")]
pub use prompt_remote as remote;

/// Local cache (enabled by `cache` feature).
#[cfg(feature = "cache")]
pub use prompt_cache as cache;

/// Logging setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use prompt_telemetry as telemetry;

/// Configuration loading (enabled by `config` feature).
#[cfg(feature = "config")]
pub use prompt_config as config;
