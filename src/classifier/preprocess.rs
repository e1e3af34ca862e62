//! Patch resizing and normalization ahead of the forward pass.

use super::error::ClassifierError;
use crate::constants::{CLASSIFIER_NORM_MEAN, CLASSIFIER_NORM_STD, PATCH_CHANNELS};
use crate::detection::Patch;

/// Bilinear resize of one square plane (half-pixel centres, edges clamped).
pub fn resize_bilinear(plane: &[f32], src: usize, dst: usize) -> Vec<f32> {
    if src == dst {
        return plane.to_vec();
    }

    let scale = src as f32 / dst as f32;
    let taps: Vec<(usize, usize, f32)> = (0..dst)
        .map(|d| {
            let s = ((d as f32 + 0.5) * scale - 0.5).max(0.0);
            let i0 = (s.floor() as usize).min(src - 1);
            let i1 = (i0 + 1).min(src - 1);
            (i0, i1, s - i0 as f32)
        })
        .collect();

    let mut out = vec![0.0; dst * dst];
    for (dy, &(y0, y1, wy)) in taps.iter().enumerate() {
        for (dx, &(x0, x1, wx)) in taps.iter().enumerate() {
            let top = plane[y0 * src + x0] * (1.0 - wx) + plane[y0 * src + x1] * wx;
            let bottom = plane[y1 * src + x0] * (1.0 - wx) + plane[y1 * src + x1] * wx;
            out[dy * dst + dx] = top * (1.0 - wy) + bottom * wy;
        }
    }
    out
}

/// Builds a normalized NCHW batch of `input_size` x `input_size` planes.
pub fn prepare_batch(patches: &[Patch], input_size: usize) -> Result<Vec<f32>, ClassifierError> {
    let plane = input_size * input_size;
    let mut batch = Vec::with_capacity(patches.len() * PATCH_CHANNELS * plane);

    for (index, patch) in patches.iter().enumerate() {
        if patch.size() == 0 {
            return Err(ClassifierError::InvalidInput {
                reason: format!("patch {index} is empty"),
            });
        }
        for channel in 0..PATCH_CHANNELS {
            let resized = resize_bilinear(patch.channel(channel), patch.size(), input_size);
            let (mean, std) = (CLASSIFIER_NORM_MEAN[channel], CLASSIFIER_NORM_STD[channel]);
            batch.extend(resized.into_iter().map(|v| (v - mean) / std));
        }
    }

    Ok(batch)
}
