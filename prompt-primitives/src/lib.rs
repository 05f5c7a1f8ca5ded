//! Core shared types for promptsync.
//!
//! Storage-independent pieces of the data model: prompt identities, the prompt
//! entity with its validation rules, and the ordered collection that both the
//! local cache and the remote document hold a complete copy of.

#![warn(missing_docs, clippy::pedantic)]

mod collection;
mod error;
mod ids;
mod prompt;

/// Ordered, identity-unique set of prompts.
pub use collection::Collection;
/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Creation-ordered prompt identity.
pub use ids::{PromptId, now_millis};
/// Prompt entity, validated user input, and helpers.
pub use prompt::{MAX_NAME_CHARS, MAX_TEXT_CHARS, Prompt, PromptDraft, parse_tags};
