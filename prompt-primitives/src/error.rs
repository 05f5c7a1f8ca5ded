//! Shared error definitions for prompt primitives.

use thiserror::Error;

/// Result alias used throughout the prompt data model.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while validating prompt input.
///
/// Validation happens before anything touches storage, so these errors are
/// never retried and always carry a reason suitable for showing to the user.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A required field was missing or whitespace only.
    #[error("{field} is required")]
    MissingField {
        /// Name of the empty field.
        field: &'static str,
    },

    /// A field exceeded its maximum length in characters.
    #[error("{field} is too long ({len} characters, maximum {max})")]
    TooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Observed length in characters.
        len: usize,
        /// Permitted maximum in characters.
        max: usize,
    },
}

impl Error {
    /// Returns the name of the field that failed validation.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::MissingField { field } | Self::TooLong { field, .. } => field,
        }
    }
}
