//! File-per-group backend.
//!
//! Each group lives in `<root>/<key-digest>.rkyv` as a [`StoredRecord`]. Files are written to a
//! temp path and renamed into place, so a crash mid-commit leaves either the old or the new record.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rkyv::rancor::Error as RkyvError;
use rkyv::to_bytes;
use tracing::{debug, warn};

use super::{CommitStats, RecordBackend, WriteOp};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::mmap::MmapFileHandle;
use crate::storage::model::{CacheRecord, StoredRecord};

const RKYV_EXTENSION: &str = "rkyv";

const TEMP_EXTENSION: &str = "rkyv.tmp";

#[derive(Debug)]
enum Staged {
    Put(CacheRecord),
    Delete,
}

#[derive(Debug, Default)]
struct Staging {
    /// A `ClearAll` is pending; older state is invisible until it commits.
    clear: bool,
    /// Last staged op per key. Later ops replace earlier ones.
    ops: BTreeMap<String, Staged>,
}

impl Staging {
    fn is_empty(&self) -> bool {
        !self.clear && self.ops.is_empty()
    }
}

#[derive(Debug, Default)]
struct BackendState {
    staged: Staging,
    /// Batch being written by the running commit; reads see it until the files are in place.
    in_commit: Option<Arc<Staging>>,
}

/// Where the current value of a key lives.
enum Resolved {
    Record(CacheRecord),
    Missing,
    OnDisk,
}

/// Stores one rkyv file per group under a root directory.
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    state: Mutex<BackendState>,
}

impl FileBackend {
    /// Opens (creating if needed) a backend rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root)
                .map_err(|_| StorageError::StorageUnavailable { path: root.clone() })?;
        }
        if !root.is_dir() {
            return Err(StorageError::StorageUnavailable { path: root });
        }

        Ok(Self {
            root,
            state: Mutex::new(BackendState::default()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_stem(key: &str) -> String {
        blake3::hash(key.as_bytes()).to_hex()[..32].to_string()
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", Self::file_stem(key), RKYV_EXTENSION))
    }

    fn temp_entry_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", Self::file_stem(key), TEMP_EXTENSION))
    }

    fn read_durable(&self, key: &str) -> StorageResult<Option<CacheRecord>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let stored = MmapFileHandle::open(&path)?.read_record()?;
        if stored.key != key {
            warn!(
                key = %key,
                found = %stored.key,
                path = %path.display(),
                "Record file belongs to a different key; ignoring"
            );
            return Ok(None);
        }
        Ok(Some(stored.record))
    }

    pub(super) fn durable_files(&self) -> StorageResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == RKYV_EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }

    fn write_record(&self, key: &str, record: &CacheRecord) -> StorageResult<()> {
        let stored = StoredRecord {
            key: key.to_string(),
            record: record.clone(),
        };
        let bytes = to_bytes::<RkyvError>(&stored)
            .map_err(|e| StorageError::Serialization(format!("{:?}", e)))?;

        let temp_path = self.temp_entry_path(key);
        let final_path = self.entry_path(key);

        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &final_path)?;
        Ok(())
    }

    fn remove_record(&self, key: &str) -> StorageResult<()> {
        let path = self.entry_path(key);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn remove_all(&self) -> StorageResult<usize> {
        let files = self.durable_files()?;
        let removed = files.len();
        for path in files {
            fs::remove_file(&path)?;
        }
        Ok(removed)
    }

    fn resolve(layer: &Staging, key: &str) -> Option<Resolved> {
        match layer.ops.get(key) {
            Some(Staged::Put(record)) => Some(Resolved::Record(record.clone())),
            Some(Staged::Delete) => Some(Resolved::Missing),
            None if layer.clear => Some(Resolved::Missing),
            None => None,
        }
    }

    fn apply(&self, batch: &Staging) -> CommitStats {
        let mut stats = CommitStats::default();

        if batch.clear {
            match self.remove_all() {
                Ok(removed) => {
                    debug!(removed, "Cleared all records");
                    stats.applied += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to clear records");
                    stats.failed += 1;
                }
            }
        }

        for (key, op) in &batch.ops {
            let (kind, result) = match op {
                Staged::Put(record) => ("put", self.write_record(key, record)),
                Staged::Delete => ("delete", self.remove_record(key)),
            };
            match result {
                Ok(()) => stats.applied += 1,
                Err(e) => {
                    warn!(key = %key, op = kind, error = %e, "Dropping failed write");
                    stats.failed += 1;
                }
            }
        }

        stats
    }
}

fn overlay_keys(keys: &mut BTreeSet<String>, layer: &Staging) {
    if layer.clear {
        keys.clear();
    }
    for (key, op) in &layer.ops {
        match op {
            Staged::Put(_) => {
                keys.insert(key.clone());
            }
            Staged::Delete => {
                keys.remove(key);
            }
        }
    }
}

impl RecordBackend for FileBackend {
    fn load(&self, key: &str) -> StorageResult<Option<CacheRecord>> {
        let resolved = {
            let state = self.state.lock();
            Self::resolve(&state.staged, key)
                .or_else(|| state.in_commit.as_deref().and_then(|b| Self::resolve(b, key)))
                .unwrap_or(Resolved::OnDisk)
        };

        match resolved {
            Resolved::Record(record) => Ok(Some(record)),
            Resolved::Missing => Ok(None),
            Resolved::OnDisk => self.read_durable(key),
        }
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let state = self.state.lock();
        let mut keys = BTreeSet::new();

        for path in self.durable_files()? {
            match MmapFileHandle::open(&path).and_then(|h| h.read_record()) {
                Ok(stored) => {
                    keys.insert(stored.key);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable record file");
                }
            }
        }

        if let Some(batch) = state.in_commit.as_deref() {
            overlay_keys(&mut keys, batch);
        }
        overlay_keys(&mut keys, &state.staged);

        Ok(keys.into_iter().collect())
    }

    fn stage(&self, op: WriteOp) -> StorageResult<()> {
        let mut state = self.state.lock();
        let staging = &mut state.staged;
        match op {
            WriteOp::Put { key, record } => {
                staging.ops.insert(key, Staged::Put(record));
            }
            WriteOp::Delete { key } => {
                staging.ops.insert(key, Staged::Delete);
            }
            WriteOp::ClearAll => {
                staging.ops.clear();
                staging.clear = true;
            }
        }
        Ok(())
    }

    fn commit(&self) -> CommitStats {
        // Readers only wait for the swap; files are written outside the lock.
        let batch = {
            let mut state = self.state.lock();
            if state.staged.is_empty() {
                return CommitStats::default();
            }
            let batch = Arc::new(std::mem::take(&mut state.staged));
            state.in_commit = Some(Arc::clone(&batch));
            batch
        };

        let stats = self.apply(&batch);
        self.state.lock().in_commit = None;
        stats
    }
}
