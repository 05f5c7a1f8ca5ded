//! In-memory cache for tests and ephemeral sessions.

use async_trait::async_trait;
use prompt_primitives::{Collection, now_millis};
use tokio::sync::RwLock;

use crate::CacheResult;
use crate::store::{CacheRecord, CacheSnapshot, LocalCache};

/// [`LocalCache`] that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryCache {
    inner: RwLock<CacheRecord>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache pre-populated with `prompts`, as if written at `last_sync`.
    #[must_use]
    pub fn seeded(prompts: Collection, last_sync: Option<i64>) -> Self {
        Self {
            inner: RwLock::new(CacheRecord {
                prompts,
                last_sync,
                pending_insert: None,
            }),
        }
    }
}

#[async_trait]
impl LocalCache for MemoryCache {
    async fn read(&self) -> CacheResult<CacheSnapshot> {
        Ok(self.inner.read().await.snapshot())
    }

    async fn write(&self, prompts: &Collection) -> CacheResult<i64> {
        let mut guard = self.inner.write().await;
        let stamp = now_millis();
        guard.prompts = prompts.clone();
        guard.last_sync = Some(stamp);
        Ok(stamp)
    }

    async fn stash_pending_insert(&self, text: &str) -> CacheResult<()> {
        self.inner.write().await.pending_insert = Some(text.to_owned());
        Ok(())
    }

    async fn take_pending_insert(&self) -> CacheResult<Option<String>> {
        Ok(self.inner.write().await.pending_insert.take())
    }
}
