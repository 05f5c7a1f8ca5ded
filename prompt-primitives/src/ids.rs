//! Prompt identifier types.

use std::fmt::{self, Display, Formatter};
use std::num::ParseIntError;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Returns the current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}

/// Unique identity of a prompt, derived from its creation time in milliseconds.
///
/// Identities double as the default sort key: larger values are newer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptId(i64);

impl PromptId {
    /// Creates an identifier from a raw epoch-millisecond value.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns a fresh identifier for a prompt created now.
    ///
    /// The result is strictly greater than `latest` when one is supplied, so
    /// two prompts created within the same millisecond stay distinct.
    #[must_use]
    pub fn next(latest: Option<Self>) -> Self {
        Self::next_at(now_millis(), latest)
    }

    /// Deterministic form of [`PromptId::next`] for a given clock reading.
    #[must_use]
    pub fn next_at(now: i64, latest: Option<Self>) -> Self {
        match latest {
            Some(Self(prev)) if prev >= now => Self(prev.saturating_add(1)),
            _ => Self(now),
        }
    }

    /// Returns the raw millisecond value.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }
}

impl Display for PromptId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<i64> for PromptId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromStr for PromptId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_prompt_id() {
        let id = PromptId::from_millis(1_700_000_000_123);
        let parsed = id.to_string().parse::<PromptId>().expect("parse");
        assert_eq!(id, parsed);
    }

    #[test]
    fn next_uses_clock_when_ahead() {
        let id = PromptId::next_at(500, Some(PromptId::from_millis(100)));
        assert_eq!(id.as_millis(), 500);
    }

    #[test]
    fn next_bumps_past_latest_within_same_millisecond() {
        let latest = PromptId::from_millis(500);
        assert_eq!(PromptId::next_at(500, Some(latest)).as_millis(), 501);
        assert_eq!(PromptId::next_at(499, Some(latest)).as_millis(), 501);
    }

    #[test]
    fn serializes_as_plain_integer() {
        let json = serde_json::to_string(&PromptId::from_millis(42)).unwrap();
        assert_eq!(json, "42");
    }
}
