//! Storage model types.
//!
//! Records are persisted as `rkyv` bytes and exported to the viewer as JSON, so every type
//! derives both the rkyv and serde traits.

use serde::{Deserialize, Serialize};

use crate::hashing::ParamsHash;

/// Human classification of a candidate.
#[derive(
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Real,
    Bogus,
}

/// Review state of a group.
#[derive(
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Freshly (re)computed, not yet reviewed.
    #[default]
    Unseen,
    /// Reviewed by a human.
    Processed,
}

/// Region of the full frame that detection ran on.
///
/// Serialized as the 4-tuple `[x, y, width, height]`.
#[derive(
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering a whole `width` x `height` frame.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }
}

impl From<[u32; 4]> for CropRect {
    fn from([x, y, width, height]: [u32; 4]) -> Self {
        Self::new(x, y, width, height)
    }
}

impl From<CropRect> for [u32; 4] {
    fn from(r: CropRect) -> Self {
        [r.x, r.y, r.width, r.height]
    }
}

/// A detected (or manually placed) transient candidate.
///
/// Coordinates are full-frame pixels. `ai_score`, `verdict` and `manual` may originate outside
/// the pipeline and must survive recomputation.
#[derive(
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    PartialEq,
)]
pub struct Candidate {
    /// Display id, 1-based within the group.
    #[serde(default)]
    pub id: u32,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub area: f64,
    #[serde(default)]
    pub sharp: f64,
    #[serde(default)]
    pub contrast: f64,
    #[serde(default)]
    pub peak: f64,
    #[serde(default)]
    pub rise: f64,
    #[serde(default)]
    pub cheap_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_score: Option<f32>,
    #[serde(default)]
    pub manual: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    #[serde(default)]
    pub saved: bool,
}

impl Candidate {
    /// A detector-produced candidate with no scores yet.
    pub fn detected(x: i32, y: i32) -> Self {
        Self {
            id: 0,
            x,
            y,
            area: 0.0,
            sharp: 0.0,
            contrast: 0.0,
            peak: 0.0,
            rise: 0.0,
            cheap_score: 0.0,
            ai_score: None,
            manual: false,
            verdict: None,
            saved: false,
        }
    }

    /// A manually placed candidate.
    pub fn manual(x: i32, y: i32) -> Self {
        Self {
            manual: true,
            ..Self::detected(x, y)
        }
    }

    pub fn with_verdict(mut self, verdict: Verdict) -> Self {
        self.verdict = Some(verdict);
        self.saved = true;
        self
    }

    /// Carries human input (manual placement or a verdict) that reprocessing must keep.
    #[inline]
    pub fn is_human_curated(&self) -> bool {
        self.manual || self.verdict.is_some()
    }

    /// Returns `true` if `other` lies within `tolerance` pixels on both axes.
    #[inline]
    pub fn is_near(&self, other: &Candidate, tolerance: i32) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }
}

/// Persisted result for one group.
#[derive(
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    PartialEq,
)]
pub struct CacheRecord {
    pub status: RecordStatus,
    pub candidates: Vec<Candidate>,
    pub crop_rect: Option<CropRect>,
    pub candidates_count: u32,
    pub has_ai: bool,
    pub max_ai: f32,
    pub params_hash: ParamsHash,
    /// Unix seconds of the last write.
    pub timestamp: f64,
}

impl CacheRecord {
    /// Builds a record and derives the summary columns from `candidates`.
    pub fn new(
        status: RecordStatus,
        candidates: Vec<Candidate>,
        crop_rect: Option<CropRect>,
        params_hash: ParamsHash,
    ) -> Self {
        let mut record = Self {
            status,
            candidates,
            crop_rect,
            candidates_count: 0,
            has_ai: false,
            max_ai: 0.0,
            params_hash,
            timestamp: unix_now(),
        };
        record.refresh_summary();
        record
    }

    /// Recomputes `candidates_count`, `has_ai` and `max_ai`.
    pub fn refresh_summary(&mut self) {
        self.candidates_count = self.candidates.len() as u32;
        let scores = self.candidates.iter().filter_map(|c| c.ai_score);
        let mut has_ai = false;
        let mut max_ai = 0.0f32;
        for score in scores {
            has_ai = true;
            max_ai = max_ai.max(score);
        }
        self.has_ai = has_ai;
        self.max_ai = max_ai;
    }

    /// A scored, non-empty record produced under `current` may be reused as-is.
    pub fn is_authoritative_for(&self, current: &ParamsHash) -> bool {
        self.has_ai && self.candidates_count > 0 && self.params_hash == *current
    }

    /// Human-curated candidates that must be carried into a recomputed record.
    pub fn curated_candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter().filter(|c| c.is_human_curated())
    }

    pub fn touch(&mut self) {
        self.timestamp = unix_now();
    }
}

/// On-disk envelope: the group key travels with its record.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub key: String,
    pub record: CacheRecord,
}

pub(crate) fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rkyv::rancor::Error;
    use rkyv::{from_bytes, to_bytes};

    fn scored(x: i32, y: i32, score: f32) -> Candidate {
        Candidate {
            ai_score: Some(score),
            ..Candidate::detected(x, y)
        }
    }

    #[test]
    fn test_record_summary_fields() {
        let record = CacheRecord::new(
            RecordStatus::Unseen,
            vec![scored(10, 10, 0.4), scored(20, 20, 0.95), Candidate::manual(5, 5)],
            Some(CropRect::full(100, 100)),
            ParamsHash([7; 32]),
        );

        assert_eq!(record.candidates_count, 3);
        assert!(record.has_ai);
        assert!((record.max_ai - 0.95).abs() < f32::EPSILON);
        assert!(record.timestamp > 0.0);
    }

    #[test]
    fn test_record_without_scores_has_no_ai() {
        let record = CacheRecord::new(
            RecordStatus::Unseen,
            vec![Candidate::manual(5, 5)],
            None,
            ParamsHash::default(),
        );

        assert!(!record.has_ai);
        assert_eq!(record.max_ai, 0.0);
    }

    #[test]
    fn test_is_authoritative_for() {
        let hash = ParamsHash([1; 32]);
        let record = CacheRecord::new(
            RecordStatus::Unseen,
            vec![scored(1, 1, 0.2)],
            None,
            hash,
        );

        assert!(record.is_authoritative_for(&hash));
        assert!(!record.is_authoritative_for(&ParamsHash([2; 32])));

        let empty = CacheRecord::new(RecordStatus::Unseen, vec![], None, hash);
        assert!(!empty.is_authoritative_for(&hash));
    }

    #[test]
    fn test_candidate_proximity_is_inclusive() {
        let a = Candidate::detected(50, 50);

        assert!(a.is_near(&Candidate::detected(55, 45), 5));
        assert!(!a.is_near(&Candidate::detected(56, 50), 5));
        assert!(!a.is_near(&Candidate::detected(50, 44), 5));
    }

    #[test]
    fn test_curated_candidates() {
        let record = CacheRecord::new(
            RecordStatus::Unseen,
            vec![
                scored(1, 1, 0.1),
                Candidate::manual(2, 2),
                scored(3, 3, 0.9).with_verdict(Verdict::Bogus),
            ],
            None,
            ParamsHash::default(),
        );

        let curated: Vec<_> = record.curated_candidates().map(|c| (c.x, c.y)).collect();
        assert_eq!(curated, vec![(2, 2), (3, 3)]);
    }

    #[test]
    fn test_viewer_json_shape() {
        let record = CacheRecord::new(
            RecordStatus::Unseen,
            vec![scored(120, 80, 0.95)],
            Some(CropRect::new(2, 2, 196, 196)),
            ParamsHash([0xab; 32]),
        );
        let json = serde_json::to_value(&record).expect("serialize");

        assert_eq!(json["status"], "unseen");
        assert_eq!(json["crop_rect"], serde_json::json!([2, 2, 196, 196]));
        assert_eq!(json["candidates_count"], 1);
        assert_eq!(json["has_ai"], true);
        assert_eq!(json["params_hash"].as_str().map(str::len), Some(64));
        assert!(json["candidates"][0].get("verdict").is_none());

        let back: CacheRecord = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, record);
    }

    #[test]
    fn test_stored_record_archive() {
        let stored = StoredRecord {
            key: "NGC001".to_string(),
            record: CacheRecord::new(
                RecordStatus::Processed,
                vec![Candidate::manual(3, 4).with_verdict(Verdict::Real)],
                None,
                ParamsHash([9; 32]),
            ),
        };

        let bytes = to_bytes::<Error>(&stored).expect("serialize");
        let back = from_bytes::<StoredRecord, Error>(&bytes).expect("deserialize");

        assert_eq!(back, stored);
    }
}
