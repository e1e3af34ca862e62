use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while extracting features from one triplet.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// A frame is missing or could not be decoded; the group is skipped.
    #[error("frame {role} unreadable at {path}: {reason}")]
    Unreadable {
        role: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// Frames of one triplet disagree in size.
    #[error("frame size mismatch: a={a:?}, b={b:?}, c={c:?}")]
    SizeMismatch {
        a: (u32, u32),
        b: (u32, u32),
        c: (u32, u32),
    },

    /// Any other failure inside stage A.
    #[error("feature extraction failed: {reason}")]
    Failed { reason: String },
}

impl ExtractionError {
    /// Returns `true` for input errors that put the group on the skip list.
    pub fn is_input_error(&self) -> bool {
        matches!(self, ExtractionError::Unreadable { .. })
    }
}

/// Errors raised while loading or validating [`super::DetectionParameters`].
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("failed to read parameters from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse parameters from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid detection parameters: {reason}")]
    Invalid { reason: String },
}

/// A single patch could not be prepared; only that candidate is dropped.
#[derive(Debug, Error)]
#[error("patch at ({x}, {y}) could not be prepared: {reason}")]
pub struct PatchError {
    pub x: i32,
    pub y: i32,
    pub reason: String,
}
