//! Run orchestration.
//!
//! [`Pipeline::run`] walks the groups in name order. Each group either short-circuits on an
//! authoritative cached record or is extracted on the blocking pool (at most `workers` at a
//! time), scored through the shared [`InferenceBatcher`](crate::batching::InferenceBatcher),
//! merged with its curated history and written through the [`ResultStore`](crate::cache::ResultStore).
//!
//! Per-group failures are collected in the [`RunSummary`]; a classifier failure aborts the run.

pub mod error;
pub mod merge;
mod orchestrator;
pub mod types;


pub use error::PipelineError;
pub use orchestrator::Pipeline;
pub use types::{GroupFailure, ProgressUpdate, RunOptions, RunSummary, StopFlag};

use std::collections::BTreeMap;
use std::path::Path;

use crate::detection::GroupPaths;

/// Reads a `{"group": {"a": ..., "b": ..., "c": ...}}` manifest.
pub fn read_manifest(path: impl AsRef<Path>) -> Result<BTreeMap<String, GroupPaths>, PipelineError> {
    let path = path.as_ref();
    let manifest_error = |reason: String| PipelineError::Manifest {
        path: path.to_path_buf(),
        reason,
    };

    let raw = std::fs::read_to_string(path).map_err(|e| manifest_error(e.to_string()))?;
    serde_json::from_str(&raw).map_err(|e| manifest_error(e.to_string()))
}
