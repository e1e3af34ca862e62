//! Test fixtures for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use image::{GrayImage, Luma};
use tscan::cache::{ResultStore, StoreConfig};
use tscan::detection::GroupPaths;
use tscan::storage::{CommitPolicy, RecordBackend};

pub const FRAME_WIDTH: u32 = 200;

pub const FRAME_HEIGHT: u32 = 160;

pub const BACKGROUND: u8 = 20;

/// Builds a synthetic triplet: spots appear in the difference and new frames only.
#[derive(Default)]
pub struct TripletBuilder {
    spots: Vec<(f64, f64)>,
}

impl TripletBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bright Gaussian spot (amplitude 200, sigma 2) centred on `(x, y)`.
    pub fn spot(mut self, x: f64, y: f64) -> Self {
        self.spots.push((x, y));
        self
    }

    /// A `cols` x `rows` grid of spots starting at `(x0, y0)`.
    pub fn grid(mut self, x0: f64, y0: f64, cols: usize, rows: usize, step: f64) -> Self {
        for row in 0..rows {
            for col in 0..cols {
                self.spots
                    .push((x0 + col as f64 * step, y0 + row as f64 * step));
            }
        }
        self
    }

    /// Writes `{name}_{a,b,c}.png` under `dir`.
    pub fn write(self, dir: &Path, name: &str) -> GroupPaths {
        let transient = GrayImage::from_fn(FRAME_WIDTH, FRAME_HEIGHT, |x, y| {
            let mut value = BACKGROUND as f64;
            for &(sx, sy) in &self.spots {
                let r2 = (x as f64 - sx).powi(2) + (y as f64 - sy).powi(2);
                value += 200.0 * (-r2 / 8.0).exp();
            }
            Luma([value.round().clamp(0.0, 255.0) as u8])
        });
        let reference = GrayImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, Luma([BACKGROUND]));

        let paths = GroupPaths::new(
            dir.join(format!("{name}_a.png")),
            dir.join(format!("{name}_b.png")),
            dir.join(format!("{name}_c.png")),
        );
        transient.save(&paths.a).expect("write frame a");
        transient.save(&paths.b).expect("write frame b");
        reference.save(&paths.c).expect("write frame c");
        paths
    }
}

/// Store config that commits almost immediately.
pub fn eager_store_config() -> StoreConfig {
    StoreConfig {
        hot_capacity: 1_000,
        commit: CommitPolicy {
            max_pending: 1,
            max_delay: Duration::from_millis(10),
        },
    }
}

pub fn store_over(backend: Arc<dyn RecordBackend>) -> ResultStore {
    ResultStore::open(backend, eager_store_config())
}
