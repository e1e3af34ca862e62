use crate::detection::DetectionParameters;
use crate::storage::Candidate;

/// Score deduction for images with too many high-confidence candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrowdPenalty {
    /// Scores at or above this are "high".
    pub high_score: f32,
    /// The penalty fires when more than this many scores are high.
    pub high_count: usize,
    pub penalty: f32,
}

impl CrowdPenalty {
    pub fn from_params(params: &DetectionParameters) -> Self {
        Self {
            high_score: params.crowd_high_score,
            high_count: params.crowd_high_count,
            penalty: params.crowd_high_penalty,
        }
    }

    /// Lowers every high score by `penalty` (floored at zero) when the image is crowded.
    ///
    /// Candidates without a score are never counted or touched. Returns the number of
    /// penalized candidates.
    pub fn apply(&self, candidates: &mut [Candidate]) -> usize {
        let is_high = |c: &Candidate| c.ai_score.is_some_and(|s| s >= self.high_score);

        let high = candidates.iter().filter(|c| is_high(c)).count();
        if high <= self.high_count {
            return 0;
        }

        for candidate in candidates.iter_mut().filter(|c| is_high(c)) {
            if let Some(score) = candidate.ai_score.as_mut() {
                *score = (*score - self.penalty).max(0.0);
            }
        }
        high
    }
}
