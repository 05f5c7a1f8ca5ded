//! Cache trait and the persisted record layout.

use async_trait::async_trait;
use prompt_primitives::Collection;
use serde::{Deserialize, Serialize};

use crate::CacheResult;

/// Consistent view of the cached collection and when it was last synchronised.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    prompts: Collection,
    last_sync: Option<i64>,
}

impl CacheSnapshot {
    /// Creates a snapshot.
    #[must_use]
    pub fn new(prompts: Collection, last_sync: Option<i64>) -> Self {
        Self { prompts, last_sync }
    }

    /// Returns the cached collection.
    #[must_use]
    pub fn prompts(&self) -> &Collection {
        &self.prompts
    }

    /// Returns the epoch-millisecond timestamp of the last write, if any.
    #[must_use]
    pub const fn last_sync(&self) -> Option<i64> {
        self.last_sync
    }

    /// Consumes the snapshot, returning the collection.
    #[must_use]
    pub fn into_prompts(self) -> Collection {
        self.prompts
    }
}

/// Device-local persistence of the last-known collection.
///
/// Holds exactly one collection, replaced wholesale on every write. There is
/// no expiry.
#[async_trait]
pub trait LocalCache: Send + Sync {
    /// Returns the stored collection and sync stamp; empty on first run.
    async fn read(&self) -> CacheResult<CacheSnapshot>;

    /// Replaces the stored collection and stamps the current time.
    ///
    /// Returns the stamp that was recorded.
    async fn write(&self, prompts: &Collection) -> CacheResult<i64>;

    /// Stores text waiting to be handed to the injection service.
    async fn stash_pending_insert(&self, text: &str) -> CacheResult<()>;

    /// Removes and returns any pending insertion text.
    async fn take_pending_insert(&self) -> CacheResult<Option<String>>;
}

/// On-disk layout: one JSON object with the three persisted keys.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CacheRecord {
    #[serde(default)]
    pub(crate) prompts: Collection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) last_sync: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) pending_insert: Option<String>,
}

impl CacheRecord {
    pub(crate) fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot::new(self.prompts.clone(), self.last_sync)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_uses_persisted_key_names() {
        let record = CacheRecord {
            prompts: Collection::new(),
            last_sync: Some(10),
            pending_insert: Some("hello".into()),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["prompts"], serde_json::json!([]));
        assert_eq!(json["lastSync"], 10);
        assert_eq!(json["pendingInsert"], "hello");
    }

    #[test]
    fn record_tolerates_missing_keys() {
        let record: CacheRecord = serde_json::from_str("{}").unwrap();
        assert!(record.prompts.is_empty());
        assert!(record.last_sync.is_none());
    }
}
