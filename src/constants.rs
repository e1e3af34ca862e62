//! Cross-cutting, shared constants.
//!
//! Detection defaults live on [`crate::detection::DetectionParameters`]; the values here are
//! fixed properties of the pipeline that are not user-tunable.

/// Side length (pixels) of the square patch cropped around each candidate.
pub const DEFAULT_CROP_SIZE: usize = 80;

/// Number of channels stacked into a patch (diff / new / reference frames).
pub const PATCH_CHANNELS: usize = 3;

/// Spatial resolution the classifier expects.
pub const CLASSIFIER_INPUT_SIZE: usize = 224;

/// Per-channel normalization mean of the training triplets.
pub const CLASSIFIER_NORM_MEAN: [f32; PATCH_CHANNELS] =
    [0.260_162_32, 0.268_292_9, 0.268_615_7];

/// Per-channel normalization standard deviation of the training triplets.
pub const CLASSIFIER_NORM_STD: [f32; PATCH_CHANNELS] =
    [0.091_330_92, 0.107_738_78, 0.108_679_12];

/// Default number of patches evaluated per classifier call.
pub const DEFAULT_INFER_CHUNK: usize = 512;

/// Default number of concurrent stage-A tasks.
pub const DEFAULT_WORKERS: usize = 4;

/// Writes staged before the writer forces a commit.
pub const DEFAULT_COMMIT_EVERY: usize = 50;

/// Maximum age (ms) of an uncommitted write.
pub const DEFAULT_COMMIT_INTERVAL_MS: u64 = 1000;

/// Records mirrored in memory by the result store.
pub const DEFAULT_HOT_CAPACITY: u64 = 10_000;

/// Maximum per-axis distance (pixels) at which two candidates are the same object.
pub const MERGE_PROXIMITY_PX: i32 = 5;

/// Radius of the window used to measure brightness rise between frames.
pub const RISE_WINDOW_RADIUS: i32 = 3;

/// Padding (pixels) around a blob searched by the dipole check.
pub const DIPOLE_PADDING: i32 = 4;

/// Pixel floor below which a nearby minimum marks a subtraction dipole.
pub const DIPOLE_FLOOR: u8 = 15;

/// Threshold applied (inverted) when locating the valid image area.
pub const AUTO_CROP_THRESHOLD: u8 = 240;

/// Pixels trimmed from each side of the auto-crop bounding box.
pub const AUTO_CROP_PADDING: u32 = 2;

/// Gaussian sigma matching a 3x3 kernel.
pub const BLUR_SIGMA: f32 = 0.8;

/// Blobs larger than this (px²) must not be nearly rectangular.
pub const EXTENT_AREA_FLOOR: f64 = 20.0;
/// Maximum fill ratio of the bounding box for blobs above [`EXTENT_AREA_FLOOR`].
pub const MAX_EXTENT: f64 = 0.90;
/// Maximum bounding-box aspect ratio.
pub const MAX_ASPECT: f64 = 3.0;
/// Minimum bounding-box aspect ratio.
pub const MIN_ASPECT: f64 = 0.33;

/// Cheap-score mode switches to robust z-scores above this many candidates.
pub const ROBUST_Z_MIN_CANDIDATES: usize = 5;
/// Consistency constant turning a MAD into a standard-deviation estimate.
pub const MAD_SCALE: f64 = 1.4826;
/// Absolute clip applied to each z-score.
pub const Z_CLIP: f64 = 5.0;

pub const W_RISE: f64 = 2.0;
pub const W_CONTRAST: f64 = 1.0;
pub const W_SHARP: f64 = 0.5;
pub const W_AREA_PENALTY: f64 = 0.3;
