//! Patch classifier (real vs. bogus transient).
//!
//! [`CandleClassifier`] runs a two-class ResNet-18 on stacked diff/new/reference patches and
//! returns the softmax probability of the "real" class. Without a model path it runs a
//! deterministic stub so the pipeline can be exercised end to end.

pub mod config;
pub mod device;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod preprocess;

#[cfg(test)]
mod tests;

pub use config::{ClassifierConfig, NUM_CLASSES, REAL_CLASS};
pub use error::ClassifierError;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockClassifier;

use candle_core::{D, DType, Device, IndexOp, Module, Tensor};
use candle_nn::{Func, VarBuilder};
use tracing::{debug, info, warn};

use crate::constants::{DEFAULT_CROP_SIZE, PATCH_CHANNELS};
use crate::detection::Patch;
use device::select_device;

/// Scores patches; one probability in `[0, 1]` per patch, in input order.
///
/// Implementations are driven from a single consumer and need not support concurrent calls
/// efficiently, but must be shareable across threads.
pub trait PatchClassifier: Send + Sync {
    fn classify(&self, patches: &[Patch]) -> Result<Vec<f32>, ClassifierError>;

    /// Dry run on a dummy patch; fails fast on a broken model before any work is scheduled.
    fn warm_up(&self) -> Result<(), ClassifierError> {
        let scores = self.classify(&[Patch::zeros(DEFAULT_CROP_SIZE)])?;
        if scores.len() != 1 {
            return Err(ClassifierError::InferenceFailed {
                reason: format!("warm-up returned {} scores for 1 patch", scores.len()),
            });
        }
        Ok(())
    }
}

/// Candle-backed ResNet-18 classifier.
pub struct CandleClassifier {
    device: Device,
    config: ClassifierConfig,
    model: Option<Func<'static>>,
}

impl std::fmt::Debug for CandleClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleClassifier")
            .field("device", &format!("{:?}", self.device))
            .field("config", &self.config)
            .field("model_loaded", &self.model.is_some())
            .finish()
    }
}

impl CandleClassifier {
    pub fn load(config: ClassifierConfig) -> Result<Self, ClassifierError> {
        if let Err(msg) = config.validate() {
            return Err(ClassifierError::InvalidConfig { reason: msg });
        }

        let device = select_device();
        debug!(?device, "Selected compute device for classifier");

        let Some(ref model_path) = config.model_path else {
            warn!("No classifier model configured, scoring with the stub backend");
            return Ok(Self {
                device,
                config,
                model: None,
            });
        };

        if !model_path.exists() {
            return Err(ClassifierError::ModelNotFound {
                path: model_path.clone(),
            });
        }

        info!(model_path = %model_path.display(), "Loading classifier model");

        // SAFETY: the weights file is mapped read-only and is not modified while the run lasts.
        let weights = std::slice::from_ref(model_path);
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(weights, DType::F32, &device) }
            .map_err(|e| ClassifierError::ModelLoadFailed {
                reason: format!("failed to map weights: {e}"),
            })?;

        let model = build_model(vb)?;
        info!("Classifier model loaded");

        Ok(Self {
            device,
            config,
            model: Some(model),
        })
    }

    pub fn stub() -> Result<Self, ClassifierError> {
        Self::load(ClassifierConfig::stub())
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    fn forward(
        &self,
        model: &Func<'static>,
        patches: &[Patch],
    ) -> Result<Vec<f32>, ClassifierError> {
        let size = self.config.input_size;
        let batch = preprocess::prepare_batch(patches, size)?;
        let shape = (patches.len(), PATCH_CHANNELS, size, size);
        let input = Tensor::from_vec(batch, shape, &self.device)?;

        let logits = model.forward(&input)?;
        let probs = candle_nn::ops::softmax(&logits, D::Minus1)?;
        let scores = probs.i((.., REAL_CLASS))?.to_dtype(DType::F32)?.to_vec1::<f32>()?;
        Ok(scores)
    }

    /// Peak of the central window of the diff channel.
    fn stub_score(patch: &Patch) -> f32 {
        let size = patch.size();
        let lo = size.saturating_sub(8) / 2;
        let hi = (lo + 8).min(size);
        let diff = patch.channel(0);

        let mut peak = 0.0f32;
        for y in lo..hi {
            for x in lo..hi {
                peak = peak.max(diff[y * size + x]);
            }
        }
        peak.clamp(0.0, 1.0)
    }
}

/// Two-class ResNet-18 over the weights in `vb`.
fn build_model(vb: VarBuilder<'static>) -> Result<Func<'static>, ClassifierError> {
    candle_transformers::models::resnet::resnet18(NUM_CLASSES, vb).map_err(|e| {
        ClassifierError::ModelLoadFailed {
            reason: format!("failed to build ResNet-18: {e}"),
        }
    })
}

impl PatchClassifier for CandleClassifier {
    fn classify(&self, patches: &[Patch]) -> Result<Vec<f32>, ClassifierError> {
        if patches.is_empty() {
            return Ok(Vec::new());
        }

        match &self.model {
            Some(model) => self.forward(model, patches),
            None => Ok(patches.iter().map(Self::stub_score).collect()),
        }
    }
}
