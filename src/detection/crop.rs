//! Valid-area detection.
//!
//! Survey frames are often embedded in a saturated (white) canvas. The valid area is the
//! bounding box of the largest non-saturated region, trimmed by a small padding.

use image::{GrayImage, Luma};

use super::geometry::{Bounds, external_contours, polygon_area};
use crate::constants::{AUTO_CROP_PADDING, AUTO_CROP_THRESHOLD};
use crate::storage::CropRect;

/// Returns the detection region of `frame`, falling back to the full frame.
pub fn auto_crop(frame: &GrayImage) -> CropRect {
    let (width, height) = frame.dimensions();
    let full = CropRect::full(width, height);
    if width == 0 || height == 0 {
        return full;
    }

    let mask = GrayImage::from_fn(width, height, |x, y| {
        if frame.get_pixel(x, y)[0] > AUTO_CROP_THRESHOLD {
            Luma([0])
        } else {
            Luma([255])
        }
    });

    let largest = external_contours(&mask)
        .into_iter()
        .map(|points| (polygon_area(&points), points))
        .max_by(|(a, _), (b, _)| a.total_cmp(b));

    let Some(bounds) = largest.and_then(|(_, points)| Bounds::of(&points)) else {
        return full;
    };

    padded_rect(bounds, width, height)
}

fn padded_rect(bounds: Bounds, width: u32, height: u32) -> CropRect {
    let pad = AUTO_CROP_PADDING;
    let x = (bounds.x.max(0) as u32 + pad).min(width - 1);
    let y = (bounds.y.max(0) as u32 + pad).min(height - 1);
    let w = (bounds.width.max(0) as u32).saturating_sub(2 * pad).max(1);
    let h = (bounds.height.max(0) as u32).saturating_sub(2 * pad).max(1);

    CropRect::new(x, y, w.min(width - x), h.min(height - y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_crop_finds_dark_region_in_white_canvas() {
        let frame = GrayImage::from_fn(100, 80, |x, y| {
            if (10..60).contains(&x) && (5..45).contains(&y) {
                Luma([30])
            } else {
                Luma([255])
            }
        });

        assert_eq!(auto_crop(&frame), CropRect::new(12, 7, 46, 36));
    }

    #[test]
    fn test_auto_crop_without_canvas_trims_padding() {
        let frame = GrayImage::from_pixel(50, 40, Luma([20]));

        assert_eq!(auto_crop(&frame), CropRect::new(2, 2, 46, 36));
    }

    #[test]
    fn test_auto_crop_region_touching_border() {
        let frame = GrayImage::from_fn(100, 80, |x, _| {
            if x < 60 { Luma([30]) } else { Luma([255]) }
        });

        assert_eq!(auto_crop(&frame), CropRect::new(2, 2, 56, 76));
    }

    #[test]
    fn test_auto_crop_saturated_frame_falls_back_to_full() {
        let frame = GrayImage::from_pixel(50, 40, Luma([250]));

        assert_eq!(auto_crop(&frame), CropRect::full(50, 40));
    }

    #[test]
    fn test_auto_crop_picks_largest_region() {
        let frame = GrayImage::from_fn(100, 100, |x, y| {
            let small = (5..15).contains(&x) && (5..15).contains(&y);
            let large = (40..90).contains(&x) && (30..95).contains(&y);
            if small || large { Luma([40]) } else { Luma([255]) }
        });

        assert_eq!(auto_crop(&frame), CropRect::new(42, 32, 46, 61));
    }
}
