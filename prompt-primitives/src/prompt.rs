//! The prompt entity and the validated input it is created from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, PromptId, Result};

/// Maximum prompt name length, in characters.
pub const MAX_NAME_CHARS: usize = 200;

/// Maximum prompt text length, in characters.
pub const MAX_TEXT_CHARS: usize = 10_000;

/// A stored text snippet.
///
/// Prompts are immutable once created: the only way to change one is to
/// rewrite the whole collection that holds it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    id: PromptId,
    name: String,
    text: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

impl Prompt {
    /// Validates `draft` and assigns it the supplied identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] when the draft fails validation.
    pub fn create(id: PromptId, draft: PromptDraft) -> Result<Self> {
        draft.validate()?;
        let now = Utc::now();
        Ok(Self {
            id,
            name: draft.name.trim().to_owned(),
            text: draft.text.trim().to_owned(),
            tags: draft.tags,
            created_at: Some(now),
            updated_at: Some(now),
        })
    }

    /// Returns the identity.
    #[must_use]
    pub const fn id(&self) -> PromptId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the snippet text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the tags in their stored order.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the creation timestamp, when the stored schema carries one.
    #[must_use]
    pub const fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Returns the last-update timestamp, when the stored schema carries one.
    #[must_use]
    pub const fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

/// Unvalidated user input for a new prompt.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PromptDraft {
    name: String,
    text: String,
    tags: Vec<String>,
}

impl PromptDraft {
    /// Creates a draft with the supplied name and text and no tags.
    #[must_use]
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            tags: Vec::new(),
        }
    }

    /// Assigns tags, dropping blank entries.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags
            .into_iter()
            .map(Into::into)
            .map(|tag| tag.trim().to_owned())
            .filter(|tag| !tag.is_empty())
            .collect();
        self
    }

    /// Checks name and text against the presence and length rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingField`] for blank fields and
    /// [`Error::TooLong`] when a bound is exceeded.
    pub fn validate(&self) -> Result<()> {
        check_field("name", &self.name, MAX_NAME_CHARS)?;
        check_field("text", &self.text, MAX_TEXT_CHARS)
    }
}

fn check_field(field: &'static str, value: &str, max: usize) -> Result<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::MissingField { field });
    }
    let len = value.chars().count();
    if len > max {
        return Err(Error::TooLong { field, len, max });
    }
    Ok(())
}

/// Splits a comma-separated tag list, trimming entries and dropping blanks.
#[must_use]
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}
