//! Stage A: per-triplet feature extraction.
//!
//! A pure, stateless procedure run on the worker pool:
//!
//! 1. decode the three frames as grayscale and restrict them to the valid area ([`crop`])
//! 2. find and filter blobs in the difference frame ([`blobs`])
//! 3. compute cheap scores and keep the top-K ([`ranking`])
//! 4. prepare one classifier patch per surviving candidate ([`patch`])
//!
//! Candidates leave this module in full-frame coordinates.

pub mod blobs;
pub mod crop;
pub mod error;
pub mod frames;
pub mod geometry;
pub mod params;
pub mod patch;
pub mod ranking;

#[cfg(test)]
mod tests;

pub use error::{ExtractionError, ParamsError, PatchError};
pub use frames::{FrameTriplet, GroupPaths};
pub use params::{CheapMode, DetectionParameters};
pub use patch::Patch;

use std::time::{Duration, Instant};

use tracing::{debug, instrument};

use crate::storage::{Candidate, CropRect};

/// Output of stage A for one group.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub name: String,
    pub crop_rect: CropRect,
    /// Surviving candidates, full-frame coordinates, parallel to `patches`.
    pub candidates: Vec<Candidate>,
    pub patches: Vec<Patch>,
    /// Candidates that passed the heuristics, before top-K selection.
    pub n_raw: usize,
    pub elapsed: Duration,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Runs stage A on the frames at `paths`.
#[instrument(skip(paths, params), fields(group = %name))]
pub fn extract_features(
    name: &str,
    paths: &GroupPaths,
    params: &DetectionParameters,
) -> Result<Extraction, ExtractionError> {
    let start = Instant::now();
    let frames = FrameTriplet::load(paths)?;
    Ok(extract_from_frames(name, &frames, params, start))
}

/// Runs stage A on already decoded frames.
pub fn extract_triplet(
    name: &str,
    frames: &FrameTriplet,
    params: &DetectionParameters,
) -> Extraction {
    extract_from_frames(name, frames, params, Instant::now())
}

fn extract_from_frames(
    name: &str,
    frames: &FrameTriplet,
    params: &DetectionParameters,
    start: Instant,
) -> Extraction {
    let (width, height) = frames.dimensions();
    let crop_rect = if params.auto_crop {
        crop::auto_crop(&frames.a)
    } else {
        CropRect::full(width, height)
    };
    let cropped = frames.crop(crop_rect);

    let raw = blobs::detect(&cropped, params);
    let n_raw = raw.len();
    let kept = ranking::rank(raw, params);

    let mut candidates = Vec::with_capacity(kept.len());
    let mut patches = Vec::with_capacity(kept.len());
    for mut candidate in kept {
        match patch::extract_patch(&cropped, candidate.x, candidate.y, params.crop_size) {
            Ok(patch) => {
                candidate.x += crop_rect.x as i32;
                candidate.y += crop_rect.y as i32;
                candidates.push(candidate);
                patches.push(patch);
            }
            Err(e) => debug!(error = %e, "Dropping candidate without a patch"),
        }
    }

    let elapsed = start.elapsed();
    debug!(
        group = %name,
        n_raw,
        n_kept = candidates.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Stage A finished"
    );

    Extraction {
        name: name.to_string(),
        crop_rect,
        candidates,
        patches,
        n_raw,
        elapsed,
    }
}
