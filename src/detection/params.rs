use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::ParamsError;
use crate::constants::DEFAULT_CROP_SIZE;

/// How the cheap pre-ranking score is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheapMode {
    /// Weighted robust z-scores of rise, contrast, sharpness and area.
    #[default]
    RobustZ,
    /// Raw rise only.
    RiseOnly,
}

/// Tunable thresholds controlling stage A and score post-processing.
///
/// Immutable for the duration of a run; every field that changes a stored record feeds
/// [`crate::hashing::params_hash`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParameters {
    /// Binary threshold (or offset over the median when `dynamic_thresh`).
    pub thresh: u8,
    /// Use `median(frame) + thresh` as the binary threshold.
    pub dynamic_thresh: bool,
    /// Smallest accepted blob area (px²).
    pub min_area: f64,
    /// Largest accepted blob area (px²).
    pub max_area: f64,
    /// Minimum peak/mean ratio.
    pub sharpness: f64,
    /// Maximum peak/mean ratio.
    pub max_sharpness: f64,
    /// Minimum peak minus median.
    pub contrast: f64,
    /// Minimum brightness rise between the new and reference frames.
    pub min_rise: f64,
    /// Blobs whose bounding box comes closer than this to the border are dropped.
    pub edge_margin: u32,
    /// Enables the sharpness / contrast bounds.
    pub kill_flat: bool,
    /// Enables the dipole check.
    pub kill_dipole: bool,
    /// Restrict detection to the largest non-saturated region.
    pub auto_crop: bool,

    /// Scores at or above this count as "high".
    pub crowd_high_score: f32,
    /// More high scores than this in one image triggers the penalty.
    pub crowd_high_count: usize,
    /// Amount subtracted from each high score when the penalty fires.
    pub crowd_high_penalty: f32,

    pub cheap_mode: CheapMode,
    pub topk_cheap: usize,
    pub topk_rise: usize,
    pub topk_contrast: usize,
    /// Keep the union of the three top-K rankings instead of top-K by cheap score.
    pub topk_union: bool,
    /// Patch side length in pixels.
    pub crop_size: usize,

    /// Classifier weights; part of the model identity.
    pub model_path: PathBuf,
}

impl Default for DetectionParameters {
    fn default() -> Self {
        Self {
            thresh: 80,
            dynamic_thresh: false,
            min_area: 6.0,
            max_area: 600.0,
            sharpness: 1.2,
            max_sharpness: 5.0,
            contrast: 15.0,
            min_rise: 0.0,
            edge_margin: 10,
            kill_flat: true,
            kill_dipole: true,
            auto_crop: true,
            crowd_high_score: 0.85,
            crowd_high_count: 10,
            crowd_high_penalty: 0.50,
            cheap_mode: CheapMode::RobustZ,
            topk_cheap: 20,
            topk_rise: 20,
            topk_contrast: 20,
            topk_union: true,
            crop_size: DEFAULT_CROP_SIZE,
            model_path: PathBuf::new(),
        }
    }
}

impl DetectionParameters {
    /// Reads parameters from a JSON file; missing keys fall back to defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ParamsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ParamsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let params: Self = serde_json::from_str(&raw).map_err(|source| ParamsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        params.validate()?;
        Ok(params)
    }

    /// Rejects parameter sets that cannot produce meaningful output.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.min_area > self.max_area {
            return Err(ParamsError::Invalid {
                reason: format!(
                    "min_area ({}) exceeds max_area ({})",
                    self.min_area, self.max_area
                ),
            });
        }
        if self.sharpness > self.max_sharpness {
            return Err(ParamsError::Invalid {
                reason: format!(
                    "sharpness ({}) exceeds max_sharpness ({})",
                    self.sharpness, self.max_sharpness
                ),
            });
        }
        if self.crop_size == 0 {
            return Err(ParamsError::Invalid {
                reason: "crop_size must be positive".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.crowd_high_score) {
            return Err(ParamsError::Invalid {
                reason: format!(
                    "crowd_high_score must be between 0.0 and 1.0, got {}",
                    self.crowd_high_score
                ),
            });
        }
        if self.topk_cheap == 0 {
            return Err(ParamsError::Invalid {
                reason: "topk_cheap must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Returns `true` if a classifier weights file is configured.
    pub fn has_model_path(&self) -> bool {
        !self.model_path.as_os_str().is_empty()
    }
}
