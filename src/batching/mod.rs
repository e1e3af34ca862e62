//! Cross-group inference batching.
//!
//! Stage-A results from many groups feed one [`InferenceBatcher`]. Patches are queued regardless
//! of origin and scored in fixed-size chunks; scores are routed back by
//! `(group, candidate_index)`. A group completes once all of its candidates are scored, at which
//! point the crowd penalty is applied and the group is handed back for merge and persistence.

pub mod crowd;


pub use crowd::CrowdPenalty;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::debug;

use crate::classifier::{ClassifierError, PatchClassifier};
use crate::detection::{Extraction, Patch};
use crate::storage::{Candidate, CropRect};

/// One patch waiting for a classifier score.
#[derive(Debug, Clone)]
pub struct PendingInferenceItem {
    pub group: String,
    pub candidate_index: usize,
    pub patch: Patch,
}

/// A fully scored group, crowd penalty applied.
#[derive(Debug, Clone)]
pub struct CompletedGroup {
    pub name: String,
    pub crop_rect: CropRect,
    pub candidates: Vec<Candidate>,
    pub n_raw: usize,
}

#[derive(Debug)]
struct GroupState {
    crop_rect: CropRect,
    candidates: Vec<Candidate>,
    n_raw: usize,
    remaining: usize,
}

impl GroupState {
    fn complete(self, name: String) -> CompletedGroup {
        CompletedGroup {
            name,
            crop_rect: self.crop_rect,
            candidates: self.candidates,
            n_raw: self.n_raw,
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatcherStats {
    pub chunks: usize,
    pub patches: usize,
    pub penalized_groups: usize,
}

/// Accumulates patches from many groups and scores them in chunks.
///
/// Single-owner: the classifier is only ever called from whichever task holds the batcher.
pub struct InferenceBatcher {
    classifier: Arc<dyn PatchClassifier>,
    chunk_size: usize,
    crowd: CrowdPenalty,
    pending: VecDeque<PendingInferenceItem>,
    groups: HashMap<String, GroupState>,
    stats: BatcherStats,
}

impl std::fmt::Debug for InferenceBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceBatcher")
            .field("chunk_size", &self.chunk_size)
            .field("crowd", &self.crowd)
            .field("pending", &self.pending.len())
            .field("open_groups", &self.groups.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl InferenceBatcher {
    pub fn new(classifier: Arc<dyn PatchClassifier>, chunk_size: usize, crowd: CrowdPenalty) -> Self {
        Self {
            classifier,
            chunk_size: chunk_size.max(1),
            crowd,
            pending: VecDeque::new(),
            groups: HashMap::new(),
            stats: BatcherStats::default(),
        }
    }

    /// Queues the patches of one extraction.
    ///
    /// A group without candidates has nothing to score and is returned as complete right away.
    pub fn submit(&mut self, extraction: Extraction) -> Option<CompletedGroup> {
        let Extraction {
            name,
            crop_rect,
            candidates,
            patches,
            n_raw,
            ..
        } = extraction;

        let state = GroupState {
            crop_rect,
            candidates,
            n_raw,
            remaining: patches.len(),
        };

        if state.remaining == 0 {
            return Some(state.complete(name));
        }

        for (candidate_index, patch) in patches.into_iter().enumerate() {
            self.pending.push_back(PendingInferenceItem {
                group: name.clone(),
                candidate_index,
                patch,
            });
        }
        self.groups.insert(name, state);
        None
    }

    /// Returns `true` once a full chunk is queued.
    pub fn should_flush(&self) -> bool {
        self.pending.len() >= self.chunk_size
    }

    /// Scores queued patches chunk by chunk.
    ///
    /// Without `force` only full chunks run; with `force` the remainder is scored as well.
    /// Returns every group completed by these chunks.
    pub fn flush(&mut self, force: bool) -> Result<Vec<CompletedGroup>, ClassifierError> {
        let mut completed = Vec::new();

        while self.pending.len() >= self.chunk_size || (force && !self.pending.is_empty()) {
            let take = self.chunk_size.min(self.pending.len());
            let chunk: Vec<PendingInferenceItem> = self.pending.drain(..take).collect();
            completed.extend(self.score_chunk(chunk)?);
        }

        Ok(completed)
    }

    fn score_chunk(
        &mut self,
        chunk: Vec<PendingInferenceItem>,
    ) -> Result<Vec<CompletedGroup>, ClassifierError> {
        let (routes, patches): (Vec<(String, usize)>, Vec<Patch>) = chunk
            .into_iter()
            .map(|item| ((item.group, item.candidate_index), item.patch))
            .unzip();

        let scores = self.classifier.classify(&patches)?;
        if scores.len() != patches.len() {
            return Err(ClassifierError::InferenceFailed {
                reason: format!(
                    "classifier returned {} scores for {} patches",
                    scores.len(),
                    patches.len()
                ),
            });
        }

        self.stats.chunks += 1;
        self.stats.patches += patches.len();

        let mut touched: Vec<String> = Vec::new();
        for ((group, index), score) in routes.into_iter().zip(scores) {
            let Some(state) = self.groups.get_mut(&group) else {
                continue;
            };
            if let Some(candidate) = state.candidates.get_mut(index) {
                candidate.ai_score = Some(score);
            }
            state.remaining = state.remaining.saturating_sub(1);
            if !touched.contains(&group) {
                touched.push(group);
            }
        }

        debug!(
            chunk_size = patches.len(),
            groups = touched.len(),
            "Scored inference chunk"
        );

        let mut completed = Vec::new();
        for name in touched {
            let done = self.groups.get(&name).is_some_and(|s| s.remaining == 0);
            if !done {
                continue;
            }
            if let Some(mut state) = self.groups.remove(&name) {
                let penalized = self.crowd.apply(&mut state.candidates);
                if penalized > 0 {
                    self.stats.penalized_groups += 1;
                    debug!(group = %name, penalized, "Applied crowd penalty");
                }
                completed.push(state.complete(name));
            }
        }

        Ok(completed)
    }

    /// Patches queued but not yet scored.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Groups with at least one unscored patch.
    pub fn open_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn stats(&self) -> BatcherStats {
        self.stats
    }
}
