//! Transient-candidate scanning over aligned image triplets.
//!
//! # Public API Surface
//!
//! ## Pipeline
//! - [`Pipeline`], [`RunOptions`], [`RunSummary`], [`StopFlag`] - Run orchestration
//! - [`Config`], [`ConfigError`] - Environment configuration
//!
//! ## Detection (stage A)
//! - [`DetectionParameters`] - Tunable thresholds, hashed into [`ParamsHash`]
//! - [`extract_features`], [`Extraction`] - Per-triplet candidate extraction
//!
//! ## Scoring
//! - [`PatchClassifier`], [`CandleClassifier`] - Real/bogus classifier
//! - [`InferenceBatcher`], [`CrowdPenalty`] - Cross-group batching
//!
//! ## Persistence
//! - [`ResultStore`] - Write-behind record store with a hot cache
//! - [`CacheRecord`], [`Candidate`] - Stored per-group results
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod batching;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod detection;
pub mod hashing;
pub mod pipeline;
pub mod storage;

pub use batching::{CompletedGroup, CrowdPenalty, InferenceBatcher, PendingInferenceItem};
pub use cache::{ResultStore, StoreConfig};
#[cfg(any(test, feature = "mock"))]
pub use classifier::MockClassifier;
pub use classifier::{CandleClassifier, ClassifierConfig, ClassifierError, PatchClassifier};
pub use config::{Config, ConfigError};
pub use detection::{
    DetectionParameters, Extraction, ExtractionError, GroupPaths, Patch, extract_features,
};
pub use hashing::{ParamsHash, params_hash};
pub use pipeline::{
    Pipeline, PipelineError, ProgressUpdate, RunOptions, RunSummary, StopFlag, read_manifest,
};
#[cfg(any(test, feature = "mock"))]
pub use storage::MockBackend;
pub use storage::{
    CacheRecord, Candidate, CropRect, FileBackend, RecordBackend, RecordStatus, StorageError,
    Verdict,
};
