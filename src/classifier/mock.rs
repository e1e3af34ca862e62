use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::PatchClassifier;
use super::error::ClassifierError;
use crate::detection::Patch;

type ScoreFn = dyn Fn(&Patch) -> f32 + Send + Sync;

/// Scripted classifier for tests; counts calls and scored patches.
#[derive(Clone)]
pub struct MockClassifier {
    score: Arc<ScoreFn>,
    fail: bool,
    calls: Arc<AtomicUsize>,
    patches: Arc<AtomicUsize>,
    batch_sizes: Arc<parking_lot::Mutex<Vec<usize>>>,
}

impl std::fmt::Debug for MockClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockClassifier")
            .field("fail", &self.fail)
            .field("calls", &self.call_count())
            .field("patches", &self.patch_count())
            .finish()
    }
}

impl MockClassifier {
    /// Scores every patch `score`.
    pub fn fixed(score: f32) -> Self {
        Self::with_fn(move |_| score)
    }

    pub fn with_fn<F>(f: F) -> Self
    where
        F: Fn(&Patch) -> f32 + Send + Sync + 'static,
    {
        Self {
            score: Arc::new(f),
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
            patches: Arc::new(AtomicUsize::new(0)),
            batch_sizes: Arc::new(parking_lot::Mutex::new(Vec::new())),
        }
    }

    /// Every call fails with [`ClassifierError::InferenceFailed`].
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::fixed(0.0)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn patch_count(&self) -> usize {
        self.patches.load(Ordering::SeqCst)
    }

    /// Size of every batch seen so far, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().clone()
    }
}

impl PatchClassifier for MockClassifier {
    fn classify(&self, patches: &[Patch]) -> Result<Vec<f32>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().push(patches.len());

        if self.fail {
            return Err(ClassifierError::InferenceFailed {
                reason: "mock classifier configured to fail".to_string(),
            });
        }

        self.patches.fetch_add(patches.len(), Ordering::SeqCst);
        Ok(patches.iter().map(|p| (self.score)(p)).collect())
    }
}
