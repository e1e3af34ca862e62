//! Compute device selection.

use candle_core::Device;
use tracing::{debug, info, warn};

type Opener = fn() -> candle_core::Result<Device>;

/// GPU backends compiled into this build, in preference order.
const GPU_BACKENDS: &[(&str, Opener)] = &[
    #[cfg(feature = "metal")]
    ("metal", || Device::new_metal(0)),
    #[cfg(feature = "cuda")]
    ("cuda", || Device::new_cuda(0)),
];

/// First GPU that opens, otherwise the CPU. A missing GPU never fails the run.
pub fn select_device() -> Device {
    for &(backend, open) in GPU_BACKENDS {
        match open() {
            Ok(device) => {
                info!(backend, "Classifier using GPU");
                return device;
            }
            Err(e) => warn!(backend, error = %e, "GPU backend unavailable"),
        }
    }

    if GPU_BACKENDS.is_empty() {
        debug!("Classifier built without GPU backends, using CPU");
    } else {
        warn!("No GPU backend could be opened, falling back to CPU");
    }
    Device::Cpu
}
