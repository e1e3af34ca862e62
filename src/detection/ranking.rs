//! Cheap pre-ranking and top-K selection.

use std::collections::HashSet;

use super::params::{CheapMode, DetectionParameters};
use crate::constants::{
    MAD_SCALE, ROBUST_Z_MIN_CANDIDATES, W_AREA_PENALTY, W_CONTRAST, W_RISE, W_SHARP, Z_CLIP,
};
use crate::storage::Candidate;

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Robust z-scores using median and MAD.
///
/// With a near-zero MAD the scores degenerate to plain deviations from the median.
pub fn robust_z(values: &[f64]) -> Vec<f64> {
    let med = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
    let mad = median(&deviations);

    if mad < 1e-6 {
        values.iter().map(|v| v - med).collect()
    } else {
        values.iter().map(|v| (v - med) / (MAD_SCALE * mad)).collect()
    }
}

/// Fills `cheap_score` on every candidate.
pub fn assign_cheap_scores(candidates: &mut [Candidate], mode: CheapMode) {
    if mode != CheapMode::RobustZ || candidates.len() <= ROBUST_Z_MIN_CANDIDATES {
        for c in candidates.iter_mut() {
            c.cheap_score = c.rise;
        }
        return;
    }

    let column = |f: fn(&Candidate) -> f64| -> Vec<f64> { candidates.iter().map(f).collect() };
    let z_rise = robust_z(&column(|c| c.rise));
    let z_contrast = robust_z(&column(|c| c.contrast));
    let z_sharp = robust_z(&column(|c| c.sharp));
    let z_area = robust_z(&column(|c| c.area));

    let clip = |z: f64| z.clamp(-Z_CLIP, Z_CLIP);
    for (i, c) in candidates.iter_mut().enumerate() {
        c.cheap_score = W_RISE * clip(z_rise[i]) + W_CONTRAST * clip(z_contrast[i])
            + W_SHARP * clip(z_sharp[i])
            - W_AREA_PENALTY * z_area[i].abs();
    }
}

fn top_by(candidates: &[Candidate], k: usize, metric: fn(&Candidate) -> f64) -> Vec<&Candidate> {
    let mut ranked: Vec<&Candidate> = candidates.iter().collect();
    // Stable sort: ties keep detection order.
    ranked.sort_by(|a, b| metric(b).total_cmp(&metric(a)));
    ranked.truncate(k);
    ranked
}

/// Keeps the candidates worth a classifier call.
///
/// Union mode merges the top-K by cheap score, rise and contrast (in that order), deduplicated by
/// position; otherwise the top-K by cheap score is kept.
pub fn select_top_k(candidates: &[Candidate], params: &DetectionParameters) -> Vec<Candidate> {
    if !params.topk_union {
        return top_by(candidates, params.topk_cheap, |c| c.cheap_score)
            .into_iter()
            .cloned()
            .collect();
    }

    let rankings = [
        top_by(candidates, params.topk_cheap, |c| c.cheap_score),
        top_by(candidates, params.topk_rise, |c| c.rise),
        top_by(candidates, params.topk_contrast, |c| c.contrast),
    ];

    let mut seen = HashSet::new();
    rankings
        .into_iter()
        .flatten()
        .filter(|c| seen.insert((c.x, c.y)))
        .cloned()
        .collect()
}

/// Scores `candidates` and returns the top-K selection.
pub fn rank(mut candidates: Vec<Candidate>, params: &DetectionParameters) -> Vec<Candidate> {
    if candidates.is_empty() {
        return candidates;
    }
    assign_cheap_scores(&mut candidates, params.cheap_mode);
    select_top_k(&candidates, params)
}
