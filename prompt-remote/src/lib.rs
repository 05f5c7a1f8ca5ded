//! Remote replica of the prompt collection.
//!
//! The collection lives in a single JSON document inside a named container
//! of a hosted document store. [`client::RemoteStoreClient`] hides the
//! two-level lookup behind the [`traits::RemoteStore`] get/set interface;
//! transports implement [`traits::DocumentService`].

#![warn(missing_docs, clippy::pedantic)]

pub mod client;
pub mod drive;
pub mod memory;
pub mod retry;
pub mod traits;

mod http_client;
