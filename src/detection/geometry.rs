//! Polygon measurements over traced contours.
//!
//! Contours are closed chains of pixel centers, so areas and centroids follow the polygon
//! (Green's theorem) definitions rather than pixel counts.

use image::GrayImage;
use image::imageops;
use imageproc::contours::{BorderType, find_contours};
use imageproc::point::Point;

/// Axis-aligned bounding box, inclusive of the outermost pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    /// Bounding box of `points`; `None` for an empty contour.
    pub fn of(points: &[Point<i32>]) -> Option<Self> {
        let first = points.first()?;
        let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        Some(Self {
            x: x0,
            y: y0,
            width: x1 - x0 + 1,
            height: y1 - y0 + 1,
        })
    }

    #[inline]
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Grows the box by `pad` on every side, clipped to a `width` x `height` frame.
    pub fn padded(&self, pad: i32, width: i32, height: i32) -> Self {
        let x = (self.x - pad).max(0);
        let y = (self.y - pad).max(0);
        let right = (self.right() + pad).min(width);
        let bottom = (self.bottom() + pad).min(height);
        Self {
            x,
            y,
            width: (right - x).max(0),
            height: (bottom - y).max(0),
        }
    }
}

fn edges(points: &[Point<i32>]) -> impl Iterator<Item = (f64, f64, f64, f64)> + '_ {
    let n = points.len();
    (0..n).map(move |i| {
        let p = points[i];
        let q = points[(i + 1) % n];
        (p.x as f64, p.y as f64, q.x as f64, q.y as f64)
    })
}

/// Unsigned polygon area (px²).
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: f64 = edges(points).map(|(x0, y0, x1, y1)| x0 * y1 - x1 * y0).sum();
    (twice / 2.0).abs()
}

/// Integer centroid from the polygon's first moments; `None` for a degenerate polygon.
pub fn centroid(points: &[Point<i32>]) -> Option<(i32, i32)> {
    if points.len() < 3 {
        return None;
    }

    let (mut m00, mut m10, mut m01) = (0.0f64, 0.0f64, 0.0f64);
    for (x0, y0, x1, y1) in edges(points) {
        let cross = x0 * y1 - x1 * y0;
        m00 += cross;
        m10 += (x0 + x1) * cross;
        m01 += (y0 + y1) * cross;
    }
    if m00.abs() < f64::EPSILON {
        return None;
    }

    // Signs cancel, so orientation does not matter. The nudge keeps exact integer centroids from
    // truncating one pixel low after rounding error.
    let cx = m10 / (3.0 * m00) + 1e-9;
    let cy = m01 / (3.0 * m00) + 1e-9;
    Some((cx.floor() as i32, cy.floor() as i32))
}

/// Outermost contours of the foreground (non-zero) regions of `mask`.
///
/// The mask is traced inside a one-pixel background frame, so regions touching the image
/// border still come back as outer contours, and a fully foreground mask yields the frame
/// outline. Points are in `mask` coordinates.
pub fn external_contours(mask: &GrayImage) -> Vec<Vec<Point<i32>>> {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let mut framed = GrayImage::new(width + 2, height + 2);
    imageops::replace(&mut framed, mask, 1, 1);

    find_contours::<i32>(&framed)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            c.points
                .into_iter()
                .map(|p| Point::new(p.x - 1, p.y - 1))
                .collect()
        })
        .collect()
}
