use std::path::PathBuf;

use crate::constants::CLASSIFIER_INPUT_SIZE;
use crate::detection::DetectionParameters;

/// Number of classifier outputs (bogus, real).
pub const NUM_CLASSES: usize = 2;

/// Index of the "real transient" class in the classifier output.
pub const REAL_CLASS: usize = 1;

#[derive(Debug, Clone, PartialEq)]
/// Configuration for [`CandleClassifier`](super::CandleClassifier).
pub struct ClassifierConfig {
    /// ResNet-18 weights in safetensors format. `None` selects the stub backend.
    pub model_path: Option<PathBuf>,
    /// Side length patches are resized to before the forward pass.
    pub input_size: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            input_size: CLASSIFIER_INPUT_SIZE,
        }
    }
}

impl ClassifierConfig {
    pub fn new<P: Into<PathBuf>>(model_path: P) -> Self {
        Self {
            model_path: Some(model_path.into()),
            ..Default::default()
        }
    }

    /// Deterministic stub mode (no model file required).
    pub fn stub() -> Self {
        Self::default()
    }

    /// Uses the model configured in `params`, if any.
    pub fn from_params(params: &DetectionParameters) -> Self {
        if params.has_model_path() {
            Self::new(params.model_path.clone())
        } else {
            Self::stub()
        }
    }

    pub fn is_stub(&self) -> bool {
        self.model_path.is_none()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.input_size == 0 {
            return Err("input_size must be positive".to_string());
        }

        if let Some(ref path) = self.model_path
            && path.as_os_str().is_empty()
        {
            return Err("model_path cannot be empty when provided".to_string());
        }

        Ok(())
    }
}
