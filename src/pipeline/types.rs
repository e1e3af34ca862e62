use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::constants::{DEFAULT_INFER_CHUNK, DEFAULT_WORKERS};
use crate::storage::CacheRecord;

/// Scheduling knobs for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Stage-A tasks in flight.
    pub workers: usize,
    /// Patches per classifier call.
    pub infer_chunk: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            infer_chunk: DEFAULT_INFER_CHUNK,
        }
    }
}

/// Emitted each time a group reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Groups finished so far; never decreases within a run.
    pub processed: usize,
    pub total: usize,
    pub label: String,
}

/// A group that produced no result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupFailure {
    pub group: String,
    pub error: String,
}

/// Outcome of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Every group with a new or cached record.
    pub results: BTreeMap<String, CacheRecord>,
    /// Groups with unreadable input.
    pub skipped: Vec<GroupFailure>,
    /// Groups whose extraction failed for any other reason.
    pub failed: Vec<GroupFailure>,
    pub cache_hits: usize,
    /// Groups recomputed and persisted this run.
    pub processed: usize,
    pub total: usize,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Groups that reached a terminal state.
    pub fn finished(&self) -> usize {
        self.cache_hits + self.processed + self.skipped.len() + self.failed.len()
    }
}

/// Run-level cancellation, polled between submissions and while draining.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
