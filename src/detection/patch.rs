//! Classifier input patches.

use image::GrayImage;

use super::error::PatchError;
use super::frames::FrameTriplet;
use crate::constants::PATCH_CHANNELS;

/// A square, channel-first (`[3, size, size]`) patch with values in `[0, 1]`.
///
/// Channels are the diff, new and reference frames in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    size: usize,
    data: Vec<f32>,
}

impl Patch {
    /// An all-zero patch.
    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            data: vec![0.0; PATCH_CHANNELS * size * size],
        }
    }

    /// Wraps raw CHW data, checking its length.
    pub fn from_chw(size: usize, data: Vec<f32>) -> Option<Self> {
        (size > 0 && data.len() == PATCH_CHANNELS * size * size).then_some(Self { size, data })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Raw CHW values.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// One channel plane, row-major.
    pub fn channel(&self, index: usize) -> &[f32] {
        let plane = self.size * self.size;
        &self.data[index * plane..(index + 1) * plane]
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}

fn copy_window(frame: &GrayImage, x0: i64, y0: i64, size: usize, out: &mut [f32]) {
    let (width, height) = (frame.width() as i64, frame.height() as i64);
    for dy in 0..size {
        let sy = y0 + dy as i64;
        if sy < 0 || sy >= height {
            continue;
        }
        for dx in 0..size {
            let sx = x0 + dx as i64;
            if sx < 0 || sx >= width {
                continue;
            }
            out[dy * size + dx] = frame.get_pixel(sx as u32, sy as u32)[0] as f32 / 255.0;
        }
    }
}

/// Crops a `size` x `size` window centred on `(cx, cy)` from each frame.
///
/// Pixels outside the frame are zero.
pub fn extract_patch(
    frames: &FrameTriplet,
    cx: i32,
    cy: i32,
    size: usize,
) -> Result<Patch, PatchError> {
    if size == 0 {
        return Err(PatchError {
            x: cx,
            y: cy,
            reason: "patch size must be positive".to_string(),
        });
    }

    let half = (size / 2) as i64;
    let x0 = cx as i64 - half;
    let y0 = cy as i64 - half;

    let mut patch = Patch::zeros(size);
    let plane = size * size;
    for (index, frame) in [&frames.a, &frames.b, &frames.c].into_iter().enumerate() {
        let out = &mut patch.data[index * plane..(index + 1) * plane];
        copy_window(frame, x0, y0, size, out);
    }
    Ok(patch)
}
