//! Durable record backends.
//!
//! Backends follow a stage-then-commit protocol: the single writer stages logical updates as they
//! arrive and periodically commits them in one batch. Reads observe staged state so a record is
//! never "lost" between staging and commit.

pub mod file;
#[cfg(any(test, feature = "mock"))]
pub mod mock;


pub use file::FileBackend;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockBackend;

use super::error::StorageResult;
use super::model::CacheRecord;

/// A logical mutation queued for the background writer.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Put {
        key: String,
        record: CacheRecord,
    },
    Delete {
        key: String,
    },
    ClearAll,
}

impl WriteOp {
    /// Group key the op targets (`None` for [`WriteOp::ClearAll`]).
    pub fn key(&self) -> Option<&str> {
        match self {
            WriteOp::Put { key, .. } | WriteOp::Delete { key } => Some(key),
            WriteOp::ClearAll => None,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WriteOp::Put { .. } => "put",
            WriteOp::Delete { .. } => "delete",
            WriteOp::ClearAll => "clear_all",
        }
    }
}

/// Outcome of one commit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommitStats {
    /// Durable mutations applied.
    pub applied: usize,
    /// Mutations that failed and were dropped (already logged).
    pub failed: usize,
}

/// Durable keyed storage for [`CacheRecord`]s.
pub trait RecordBackend: Send + Sync + 'static {
    /// Loads the record for `key`, including staged but uncommitted state.
    fn load(&self, key: &str) -> StorageResult<Option<CacheRecord>>;

    /// Lists every key currently visible (durable plus staged).
    fn keys(&self) -> StorageResult<Vec<String>>;

    /// Stages `op`; it becomes durable on the next [`commit`](RecordBackend::commit).
    fn stage(&self, op: WriteOp) -> StorageResult<()>;

    /// Makes all staged ops durable. Individual failures are logged and counted, never raised.
    fn commit(&self) -> CommitStats;
}
