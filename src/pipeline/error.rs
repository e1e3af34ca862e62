use std::path::PathBuf;
use thiserror::Error;

use crate::classifier::ClassifierError;
use crate::detection::ParamsError;
use crate::storage::StorageError;

/// Errors that abort a pipeline run.
///
/// Per-group extraction failures never surface here; they are reported in the run summary.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Scores would be incomplete; nothing further is persisted.
    #[error("classifier failed, run aborted: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("result store failed: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error("failed to read manifest {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    #[error("background task failed: {reason}")]
    Task { reason: String },
}

impl PipelineError {
    /// Returns `true` when the classifier is at fault.
    pub fn is_classifier_failure(&self) -> bool {
        matches!(self, PipelineError::Classifier(_))
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        PipelineError::Task {
            reason: err.to_string(),
        }
    }
}
