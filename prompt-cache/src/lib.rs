//! Local replica of the prompt collection.
//!
//! A cache holds the last-known complete collection together with the time
//! it was last written, plus a transient slot for text awaiting injection.

#![warn(missing_docs, clippy::pedantic)]

mod error;
pub mod file;
pub mod store;
pub mod volatile;

pub use error::{CacheError, CacheResult};
pub use file::FileCache;
pub use store::{CacheSnapshot, LocalCache};
pub use volatile::MemoryCache;
