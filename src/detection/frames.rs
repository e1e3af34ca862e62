//! Loading and cropping of image triplets.

use std::path::{Path, PathBuf};

use image::GrayImage;
use image::imageops;
use serde::{Deserialize, Serialize};

use super::error::ExtractionError;
use crate::storage::CropRect;

/// Frame paths of one group: `a` is the difference frame, `b` the new frame, `c` the reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPaths {
    pub a: PathBuf,
    pub b: PathBuf,
    pub c: PathBuf,
}

impl GroupPaths {
    pub fn new(a: impl Into<PathBuf>, b: impl Into<PathBuf>, c: impl Into<PathBuf>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            c: c.into(),
        }
    }
}

/// Three aligned grayscale frames.
#[derive(Debug, Clone)]
pub struct FrameTriplet {
    pub a: GrayImage,
    pub b: GrayImage,
    pub c: GrayImage,
}

fn load_gray(role: &'static str, path: &Path) -> Result<GrayImage, ExtractionError> {
    image::open(path)
        .map(|img| img.to_luma8())
        .map_err(|e| ExtractionError::Unreadable {
            role,
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

impl FrameTriplet {
    /// Builds a triplet from in-memory frames, checking that their sizes agree.
    pub fn new(a: GrayImage, b: GrayImage, c: GrayImage) -> Result<Self, ExtractionError> {
        if a.dimensions() != b.dimensions() || a.dimensions() != c.dimensions() {
            return Err(ExtractionError::SizeMismatch {
                a: a.dimensions(),
                b: b.dimensions(),
                c: c.dimensions(),
            });
        }
        Ok(Self { a, b, c })
    }

    /// Decodes all three frames as 8-bit grayscale.
    pub fn load(paths: &GroupPaths) -> Result<Self, ExtractionError> {
        let a = load_gray("a", &paths.a)?;
        let b = load_gray("b", &paths.b)?;
        let c = load_gray("c", &paths.c)?;
        Self::new(a, b, c)
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        self.a.dimensions()
    }

    /// Restricts all three frames to `rect`.
    pub fn crop(&self, rect: CropRect) -> Self {
        let cut = |img: &GrayImage| {
            imageops::crop_imm(img, rect.x, rect.y, rect.width, rect.height).to_image()
        };
        Self {
            a: cut(&self.a),
            b: cut(&self.b),
            c: cut(&self.c),
        }
    }
}
