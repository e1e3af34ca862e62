//! Persistent result storage.
//!
//! Records are keyed by group name and written through a single background
//! [`RecordWriter`](writer::RecordWriter) that batches commits.

pub mod backend;
pub mod error;
pub mod mmap;
mod model;
pub mod writer;

pub use backend::{CommitStats, FileBackend, RecordBackend, WriteOp};
#[cfg(any(test, feature = "mock"))]
pub use backend::MockBackend;
pub use error::{StorageError, StorageResult};
pub use model::{CacheRecord, Candidate, CropRect, RecordStatus, StoredRecord, Verdict};
pub(crate) use model::unix_now;
pub use writer::{CommitPolicy, PendingView, RecordWriter, WriterStats};
