//! Read-only memory maps over persisted record files.

use std::fs::File;
use std::io;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use rkyv::rancor::Error as RkyvError;
use thiserror::Error;

use super::model::StoredRecord;

pub const RKYV_ALIGNMENT: usize = 16;

#[derive(Error, Debug)]
pub enum MmapError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Cannot mmap empty file")]
    EmptyFile,

    #[error("rkyv validation failed: {0}")]
    ValidationFailed(String),

    #[error("Data is not aligned to {alignment} bytes")]
    AlignmentError { alignment: usize },
}

pub type MmapResult<T> = Result<T, MmapError>;

#[derive(Clone)]
pub struct MmapFileHandle {
    inner: Arc<Mmap>,
    path: Arc<std::path::PathBuf>,
}

impl std::fmt::Debug for MmapFileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmapFileHandle")
            .field("path", &self.path)
            .field("len", &self.len())
            .finish()
    }
}

impl MmapFileHandle {
    pub fn open<P: AsRef<Path>>(path: P) -> MmapResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

        let metadata = file.metadata()?;
        if metadata.len() == 0 {
            return Err(MmapError::EmptyFile);
        }

        // SAFETY: record files are only replaced by atomic rename, never modified in place,
        // so the mapped bytes stay valid for the lifetime of the mapping.
        let mmap = unsafe { Mmap::map(&file)? };

        Ok(Self {
            inner: Arc::new(mmap),
            path: Arc::new(path.to_path_buf()),
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        self.inner.deref()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validates and deserializes the mapped bytes as a [`StoredRecord`].
    pub fn read_record(&self) -> MmapResult<StoredRecord> {
        let data = self.as_slice();
        if !(data.as_ptr() as usize).is_multiple_of(RKYV_ALIGNMENT) {
            return Err(MmapError::AlignmentError {
                alignment: RKYV_ALIGNMENT,
            });
        }

        rkyv::from_bytes::<StoredRecord, RkyvError>(data)
            .map_err(|e| MmapError::ValidationFailed(format!("{:?}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::ParamsHash;
    use crate::storage::{CacheRecord, Candidate, RecordStatus};
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.rkyv");
        std::fs::write(&path, b"").unwrap();

        assert!(matches!(
            MmapFileHandle::open(&path),
            Err(MmapError::EmptyFile)
        ));
    }

    #[test]
    fn test_read_record_from_mapping() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("record.rkyv");
        let stored = StoredRecord {
            key: "NGC001".to_string(),
            record: CacheRecord::new(
                RecordStatus::Unseen,
                vec![Candidate::detected(120, 80)],
                None,
                ParamsHash([5; 32]),
            ),
        };
        let bytes = rkyv::to_bytes::<RkyvError>(&stored).unwrap();
        std::fs::write(&path, &bytes).unwrap();

        let handle = MmapFileHandle::open(&path).unwrap();

        assert_eq!(handle.len(), bytes.len());
        assert_eq!(handle.path(), path.as_path());
        assert_eq!(handle.read_record().unwrap(), stored);
    }

    #[test]
    fn test_garbage_fails_validation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.rkyv");
        std::fs::write(&path, [0xffu8; 64]).unwrap();

        let handle = MmapFileHandle::open(&path).unwrap();
        assert!(matches!(
            handle.read_record(),
            Err(MmapError::ValidationFailed(_))
        ));
    }
}
