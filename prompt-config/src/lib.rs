//! Configuration management for promptsync.
//!
//! Settings come from built-in defaults, an optional JSON file, and
//! `PROMPTSYNC_*` environment variables, applied in that order.

#![warn(missing_docs, clippy::pedantic)]

pub mod loader;
pub mod schema;

pub use loader::{ConfigError, ConfigLoader, ConfigResult, ENV_PREFIX};
pub use schema::SyncConfig;
