//! Result store: a hot in-memory mirror over a durable backend.
//!
//! Reads consult the writer's unstaged overlay, then the mirror, then the backend. Writes update
//! the mirror synchronously and are queued on the single [`RecordWriter`], which commits them in
//! batches. Callers never block on I/O, and read their own writes even after the mirror evicts
//! them.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use super::hot::{HotCache, HotLookup};
use crate::constants::DEFAULT_HOT_CAPACITY;
use crate::storage::{
    CacheRecord, CommitPolicy, FileBackend, PendingView, RecordBackend, RecordStatus,
    RecordWriter, StorageResult, WriteOp, WriterStats, unix_now,
};

/// Result store tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    pub hot_capacity: u64,
    pub commit: CommitPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            hot_capacity: DEFAULT_HOT_CAPACITY,
            commit: CommitPolicy::default(),
        }
    }
}

struct StoreInner {
    hot: HotCache,
    backend: Arc<dyn RecordBackend>,
    writer: RecordWriter,
}

/// Shared handle to the result store. Cloning is cheap.
#[derive(Clone)]
pub struct ResultStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for ResultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStore")
            .field("hot", &self.inner.hot)
            .field("writer", &self.inner.writer)
            .finish()
    }
}

impl ResultStore {
    /// Opens a store over `backend` and spawns its writer on the current tokio runtime.
    pub fn open(backend: Arc<dyn RecordBackend>, config: StoreConfig) -> Self {
        let writer = RecordWriter::spawn(Arc::clone(&backend), config.commit);
        Self {
            inner: Arc::new(StoreInner {
                hot: HotCache::with_capacity(config.hot_capacity),
                backend,
                writer,
            }),
        }
    }

    /// Opens a file-backed store rooted at `path`.
    pub fn open_dir(path: impl AsRef<Path>, config: StoreConfig) -> StorageResult<Self> {
        let backend = FileBackend::open(path.as_ref())?;
        Ok(Self::open(Arc::new(backend), config))
    }

    /// Returns the record for `key`, if any.
    pub fn get(&self, key: &str) -> StorageResult<Option<CacheRecord>> {
        match self.inner.writer.pending_view(key) {
            Some(PendingView::Present(record)) => return Ok(Some(record.as_ref().clone())),
            Some(PendingView::Deleted) => return Ok(None),
            None => {}
        }

        match self.inner.hot.lookup(key) {
            HotLookup::Present(record) => Ok(Some(record.as_ref().clone())),
            HotLookup::Deleted => Ok(None),
            HotLookup::Miss => {
                let loaded = self.inner.backend.load(key)?;
                if let Some(record) = &loaded {
                    self.inner.hot.insert(key, record.clone());
                }
                Ok(loaded)
            }
        }
    }

    /// Upserts the record for `key`.
    ///
    /// A `None` crop rect keeps the crop rect already stored for the group.
    #[instrument(skip(self, record), fields(candidates = record.candidates.len()))]
    pub fn put(&self, key: &str, mut record: CacheRecord) -> StorageResult<()> {
        if record.crop_rect.is_none()
            && let Some(existing) = self.get(key)?
        {
            record.crop_rect = existing.crop_rect;
        }

        self.inner.hot.insert(key, record.clone());
        self.inner.writer.submit(WriteOp::Put {
            key: key.to_string(),
            record,
        })
    }

    /// Sets the review status of `key` and refreshes its timestamp.
    ///
    /// Returns `false` when the group has no record.
    pub fn mark_status(&self, key: &str, status: RecordStatus) -> StorageResult<bool> {
        let Some(mut record) = self.get(key)? else {
            debug!(key = %key, "mark_status on unknown group");
            return Ok(false);
        };

        record.status = status;
        record.timestamp = unix_now();
        self.inner.hot.insert(key, record.clone());

        self.inner.writer.submit(WriteOp::Put {
            key: key.to_string(),
            record,
        })?;
        Ok(true)
    }

    /// Removes the record for `key`.
    pub fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.hot.tombstone(key);
        self.inner.writer.submit(WriteOp::Delete {
            key: key.to_string(),
        })
    }

    /// Removes every record and waits for the removal to be durable.
    pub async fn clear_all(&self) -> StorageResult<()> {
        self.inner.writer.submit(WriteOp::ClearAll)?;
        self.inner.writer.flush().await?;
        self.inner.hot.clear();
        Ok(())
    }

    /// Group keys with a record, sorted. Writes still queued on the writer are not included.
    pub fn keys(&self) -> StorageResult<Vec<String>> {
        self.inner.backend.keys()
    }

    /// Waits until every write submitted so far is committed.
    pub async fn flush(&self) -> StorageResult<()> {
        self.inner.writer.flush().await
    }

    /// Writes submitted but not yet handed to the backend.
    pub fn pending_writes(&self) -> usize {
        self.inner.writer.pending()
    }

    /// Drains outstanding writes and stops the writer.
    pub async fn shutdown(&self) -> StorageResult<WriterStats> {
        self.inner.writer.shutdown().await
    }
}
