use std::path::PathBuf;
use thiserror::Error;

use super::mmap::MmapError;

/// Errors returned by record backends and the background writer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("mmap error: {0}")]
    Mmap(#[from] MmapError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage path unavailable: {path}")]
    StorageUnavailable { path: PathBuf },

    #[error("write failed for '{key}': {reason}")]
    WriteFailed { key: String, reason: String },

    #[error("record writer has shut down")]
    WriterClosed,
}

/// Convenience result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
