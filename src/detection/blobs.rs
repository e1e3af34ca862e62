//! Blob detection and heuristic rejection.

use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;

use super::frames::FrameTriplet;
use super::geometry::{Bounds, centroid, external_contours, polygon_area};
use super::params::DetectionParameters;
use crate::constants::{
    BLUR_SIGMA, DIPOLE_FLOOR, DIPOLE_PADDING, EXTENT_AREA_FLOOR, MAX_ASPECT, MAX_EXTENT,
    MIN_ASPECT, RISE_WINDOW_RADIUS,
};
use crate::storage::Candidate;

/// Median of 8-bit samples; even-length inputs average the two middle values.
pub(crate) fn median_u8(values: &mut [u8]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] as f64 + values[mid] as f64) / 2.0
    } else {
        values[mid] as f64
    }
}

/// Binary threshold level for frame `a`.
pub(crate) fn binary_level(frame: &GrayImage, params: &DetectionParameters) -> f64 {
    let offset = params.thresh as f64;
    if params.dynamic_thresh {
        let mut samples = frame.as_raw().clone();
        (median_u8(&mut samples) + offset).min(255.0)
    } else {
        offset
    }
}

fn binarize(frame: &GrayImage, level: f64) -> GrayImage {
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        if frame.get_pixel(x, y)[0] as f64 > level {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

fn region(frame: &GrayImage, bounds: Bounds) -> Vec<u8> {
    let mut out = Vec::with_capacity((bounds.width.max(0) * bounds.height.max(0)) as usize);
    for y in bounds.y..bounds.bottom() {
        for x in bounds.x..bounds.right() {
            out.push(frame.get_pixel(x as u32, y as u32)[0]);
        }
    }
    out
}

/// Brightness rise at `(cx, cy)`: window max in the new frame minus window max in the reference.
fn rise_at(frames: &FrameTriplet, cx: i32, cy: i32) -> Option<f64> {
    let (width, height) = frames.dimensions();
    let r = RISE_WINDOW_RADIUS;
    let window = Bounds {
        x: cx - r,
        y: cy - r,
        width: 2 * r + 1,
        height: 2 * r + 1,
    }
    .padded(0, width as i32, height as i32);
    if window.width <= 0 || window.height <= 0 {
        return None;
    }

    let peak_b = region(&frames.b, window).into_iter().max()?;
    let peak_c = region(&frames.c, window).into_iter().max()?;
    Some(peak_b as f64 - peak_c as f64)
}

struct SpotStats {
    peak: f64,
    sharpness: f64,
    contrast: f64,
}

fn spot_stats(frame: &GrayImage, bounds: Bounds) -> Option<SpotStats> {
    let mut values = region(frame, bounds);
    if values.is_empty() {
        return None;
    }
    let peak = *values.iter().max()? as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64;
    let median = median_u8(&mut values);

    Some(SpotStats {
        peak,
        sharpness: peak / (mean + 1e-6),
        contrast: peak - median,
    })
}

fn is_dipole(frame: &GrayImage, bounds: Bounds) -> bool {
    let (width, height) = frame.dimensions();
    let area = bounds.padded(DIPOLE_PADDING, width as i32, height as i32);
    region(frame, area)
        .into_iter()
        .min()
        .is_some_and(|floor| floor < DIPOLE_FLOOR)
}

/// Finds candidate blobs in the (already cropped) triplet.
///
/// Coordinates of the returned candidates are relative to the cropped frames. Candidates carry
/// their features but no cheap score yet.
pub fn detect(frames: &FrameTriplet, params: &DetectionParameters) -> Vec<Candidate> {
    let (width, height) = frames.dimensions();
    let (w_img, h_img) = (width as i32, height as i32);
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let blurred = gaussian_blur_f32(&frames.a, BLUR_SIGMA);
    let mask = binarize(&blurred, binary_level(&frames.a, params));
    let edge = params.edge_margin as i32;

    let mut candidates = Vec::new();
    for points in external_contours(&mask) {
        let area = polygon_area(&points);
        if area < params.min_area || area > params.max_area {
            continue;
        }

        let Some(bounds) = Bounds::of(&points) else {
            continue;
        };
        if bounds.x < edge
            || bounds.y < edge
            || bounds.right() > w_img - edge
            || bounds.bottom() > h_img - edge
        {
            continue;
        }

        let Some((cx, cy)) = centroid(&points) else {
            continue;
        };

        let Some(rise) = rise_at(frames, cx, cy) else {
            continue;
        };
        if rise < params.min_rise {
            continue;
        }

        let Some(stats) = spot_stats(&frames.a, bounds) else {
            continue;
        };
        if params.kill_flat
            && (stats.sharpness < params.sharpness
                || stats.sharpness > params.max_sharpness
                || stats.contrast < params.contrast)
        {
            continue;
        }

        let extent = area / (bounds.width * bounds.height) as f64;
        let aspect = bounds.width as f64 / bounds.height as f64;
        if area > EXTENT_AREA_FLOOR && extent > MAX_EXTENT {
            continue;
        }
        if !(MIN_ASPECT..=MAX_ASPECT).contains(&aspect) {
            continue;
        }

        if params.kill_dipole && is_dipole(&frames.a, bounds) {
            continue;
        }

        candidates.push(Candidate {
            area,
            sharp: stats.sharpness,
            contrast: stats.contrast,
            peak: stats.peak,
            rise,
            ..Candidate::detected(cx, cy)
        });
    }

    candidates
}
