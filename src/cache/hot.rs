//! In-memory mirror of recently read or written records.
//!
//! Entries are either a record or a tombstone for a deleted group, so a delete is visible before
//! the writer commits it.

use moka::sync::Cache;
use std::sync::Arc;

use crate::constants::DEFAULT_HOT_CAPACITY;
use crate::storage::CacheRecord;

/// Result of a hot-cache probe.
#[derive(Debug, Clone, PartialEq)]
pub enum HotLookup {
    /// The group has a record.
    Present(Arc<CacheRecord>),
    /// The group was deleted and the delete may not be durable yet.
    Deleted,
    /// Not mirrored; consult the backend.
    Miss,
}

/// Bounded record mirror keyed by group name.
pub struct HotCache {
    entries: Cache<String, Option<Arc<CacheRecord>>>,
}

impl HotCache {
    /// Creates a cache with the default capacity.
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HOT_CAPACITY)
    }

    /// Creates a cache with a max entry capacity.
    ///
    /// moka admits and evicts by TinyLFU, so a fresh insert may be dropped before any older entry.
    /// Callers that need read-after-write must not rely on the mirror alone.
    #[inline]
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(capacity).build(),
        }
    }

    #[inline]
    pub fn lookup(&self, key: &str) -> HotLookup {
        match self.entries.get(key) {
            Some(Some(record)) => HotLookup::Present(record),
            Some(None) => HotLookup::Deleted,
            None => HotLookup::Miss,
        }
    }

    #[inline]
    pub fn insert(&self, key: &str, record: CacheRecord) {
        self.entries.insert(key.to_string(), Some(Arc::new(record)));
    }

    /// Records a delete.
    #[inline]
    pub fn tombstone(&self, key: &str) {
        self.entries.insert(key.to_string(), None);
    }

    /// Forgets `key` so the next lookup misses.
    #[inline]
    pub fn forget(&self, key: &str) {
        self.entries.invalidate(key);
    }

    /// Returns the number of mirrored entries (records and tombstones).
    #[inline]
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.entry_count() == 0
    }

    #[inline]
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    /// Runs any pending maintenance tasks in the underlying cache.
    #[inline]
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }
}

impl Default for HotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotCache")
            .field("entry_count", &self.entries.entry_count())
            .finish()
    }
}
