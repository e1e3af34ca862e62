//! Reconciliation of human-curated candidates into a recomputed list.

use crate::constants::MERGE_PROXIMITY_PX;
use crate::storage::{CacheRecord, Candidate};

/// Folds the manual and verdict-bearing candidates of `previous` into `fresh`.
///
/// A curated candidate within [`MERGE_PROXIMITY_PX`] of one already in the list hands over its
/// verdict (if any) and is not duplicated; otherwise it is appended unchanged. Ids are
/// renumbered `1..=n` afterwards.
pub fn reconcile(mut fresh: Vec<Candidate>, previous: Option<&CacheRecord>) -> Vec<Candidate> {
    if let Some(previous) = previous {
        for old in previous.curated_candidates() {
            match fresh.iter_mut().find(|c| c.is_near(old, MERGE_PROXIMITY_PX)) {
                Some(current) => {
                    if old.verdict.is_some() {
                        current.verdict = old.verdict;
                        current.saved = old.saved;
                    }
                }
                None => fresh.push(old.clone()),
            }
        }
    }

    renumber(&mut fresh);
    fresh
}

pub fn renumber(candidates: &mut [Candidate]) {
    for (index, candidate) in candidates.iter_mut().enumerate() {
        candidate.id = index as u32 + 1;
    }
}
