//! File-backed cache writing a single JSON record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use prompt_primitives::{Collection, now_millis};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::CacheResult;
use crate::store::{CacheRecord, CacheSnapshot, LocalCache};

/// Cache persisted as one JSON file.
///
/// Writes go to a sibling temporary file that is renamed over the target, so
/// a reader never observes a collection without its matching sync stamp.
pub struct FileCache {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCache {
    /// Opens a cache at the provided path, creating parent directories.
    ///
    /// The file itself is created on first write.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors encountered while preparing the directory.
    pub async fn open(path: impl Into<PathBuf>) -> CacheResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Returns the underlying path of the cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> CacheResult<CacheRecord> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(CacheRecord::default()),
            Err(err) => return Err(err.into()),
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(CacheRecord::default());
        }
        Ok(serde_json::from_slice(&data)?)
    }

    async fn store(&self, record: &CacheRecord) -> CacheResult<()> {
        let bytes = serde_json::to_vec(record)?;
        let tmp = self.path.with_extension("tmp");

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl LocalCache for FileCache {
    async fn read(&self) -> CacheResult<CacheSnapshot> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.snapshot())
    }

    async fn write(&self, prompts: &Collection) -> CacheResult<i64> {
        let _guard = self.lock.lock().await;
        let mut record = self.load().await.unwrap_or_default();
        let stamp = now_millis();
        record.prompts = prompts.clone();
        record.last_sync = Some(stamp);
        self.store(&record).await?;
        debug!(path = %self.path.display(), prompts = prompts.len(), "cache written");
        Ok(stamp)
    }

    async fn stash_pending_insert(&self, text: &str) -> CacheResult<()> {
        let _guard = self.lock.lock().await;
        let mut record = self.load().await?;
        record.pending_insert = Some(text.to_owned());
        self.store(&record).await
    }

    async fn take_pending_insert(&self) -> CacheResult<Option<String>> {
        let _guard = self.lock.lock().await;
        let mut record = self.load().await?;
        let pending = record.pending_insert.take();
        if pending.is_some() {
            self.store(&record).await?;
        }
        Ok(pending)
    }
}
