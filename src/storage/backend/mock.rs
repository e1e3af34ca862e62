//! In-memory backend for tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::{CommitStats, RecordBackend, WriteOp};
use crate::storage::error::StorageResult;
use crate::storage::model::CacheRecord;

#[derive(Debug, Default)]
struct MockState {
    durable: BTreeMap<String, CacheRecord>,
    staged: Vec<WriteOp>,
    commits: usize,
    writes: HashMap<String, usize>,
    failing: HashSet<String>,
}

fn apply(map: &mut BTreeMap<String, CacheRecord>, op: &WriteOp) {
    match op {
        WriteOp::Put { key, record } => {
            map.insert(key.clone(), record.clone());
        }
        WriteOp::Delete { key } => {
            map.remove(key);
        }
        WriteOp::ClearAll => map.clear(),
    }
}

/// Cloneable in-memory [`RecordBackend`] that counts commits and per-key writes.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a durable record, as if written by an earlier run.
    pub fn with_record(self, key: &str, record: CacheRecord) -> Self {
        self.state.lock().durable.insert(key.to_string(), record);
        self
    }

    /// Makes every durable write to `key` fail.
    pub fn fail_writes_for(&self, key: &str) {
        self.state.lock().failing.insert(key.to_string());
    }

    pub fn commit_count(&self) -> usize {
        self.state.lock().commits
    }

    /// Number of committed writes (put or delete) that touched `key`.
    pub fn write_count(&self, key: &str) -> usize {
        self.state.lock().writes.get(key).copied().unwrap_or(0)
    }

    pub fn staged_len(&self) -> usize {
        self.state.lock().staged.len()
    }

    /// Committed record for `key`, ignoring staged ops.
    pub fn durable(&self, key: &str) -> Option<CacheRecord> {
        self.state.lock().durable.get(key).cloned()
    }

    pub fn durable_len(&self) -> usize {
        self.state.lock().durable.len()
    }
}

impl RecordBackend for MockBackend {
    fn load(&self, key: &str) -> StorageResult<Option<CacheRecord>> {
        let state = self.state.lock();
        let mut view = BTreeMap::new();
        if let Some(record) = state.durable.get(key) {
            view.insert(key.to_string(), record.clone());
        }
        for op in &state.staged {
            if op.key().is_none_or(|k| k == key) {
                apply(&mut view, op);
            }
        }
        Ok(view.remove(key))
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let state = self.state.lock();
        let mut view = state.durable.clone();
        for op in &state.staged {
            apply(&mut view, op);
        }
        Ok(view.into_keys().collect())
    }

    fn stage(&self, op: WriteOp) -> StorageResult<()> {
        self.state.lock().staged.push(op);
        Ok(())
    }

    fn commit(&self) -> CommitStats {
        let mut state = self.state.lock();
        let mut stats = CommitStats::default();

        for op in std::mem::take(&mut state.staged) {
            if let Some(key) = op.key() {
                if state.failing.contains(key) {
                    warn!(key = %key, op = op.kind(), "Dropping failed write");
                    stats.failed += 1;
                    continue;
                }
                *state.writes.entry(key.to_string()).or_default() += 1;
            }
            apply(&mut state.durable, &op);
            stats.applied += 1;
        }

        state.commits += 1;
        stats
    }
}
