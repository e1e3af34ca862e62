//! Parameter hashing for cache invalidation.
//!
//! A stored record is reusable only while the digest of the parameters that produced it matches
//! the digest of the current run. The digest is BLAKE3 over a canonical, sorted-key JSON rendering
//! of exactly the fields that change a record.

use std::collections::BTreeMap;
use std::fmt;

use blake3::Hasher;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Value, json};

use crate::detection::DetectionParameters;

/// Fixed-length (32-byte) digest of the output-affecting detection parameters.
#[derive(
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
)]
pub struct ParamsHash(pub [u8; 32]);

impl ParamsHash {
    /// Returns the raw digest bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering (64 characters).
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }

    /// Parses a 64-character hex digest.
    pub fn from_hex(hex: &str) -> Option<Self> {
        blake3::Hash::from_hex(hex)
            .ok()
            .map(|h| Self(*h.as_bytes()))
    }

    /// Returns `true` for the all-zero placeholder digest.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl fmt::Display for ParamsHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ParamsHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ParamsHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        if hex.is_empty() {
            return Ok(Self::default());
        }
        Self::from_hex(&hex)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid params hash '{hex}'")))
    }
}

/// Returns the parameter subset that influences stored records, keyed by name.
///
/// The map is ordered so the JSON rendering is canonical.
pub fn hashed_fields(params: &DetectionParameters) -> BTreeMap<&'static str, Value> {
    BTreeMap::from([
        ("thresh", json!(params.thresh)),
        ("dynamic_thresh", json!(params.dynamic_thresh)),
        ("min_area", json!(params.min_area)),
        ("max_area", json!(params.max_area)),
        ("sharpness", json!(params.sharpness)),
        ("max_sharpness", json!(params.max_sharpness)),
        ("contrast", json!(params.contrast)),
        ("min_rise", json!(params.min_rise)),
        ("edge_margin", json!(params.edge_margin)),
        ("kill_flat", json!(params.kill_flat)),
        ("kill_dipole", json!(params.kill_dipole)),
        ("auto_crop", json!(params.auto_crop)),
        ("crowd_high_score", json!(params.crowd_high_score)),
        ("crowd_high_count", json!(params.crowd_high_count)),
        ("crowd_high_penalty", json!(params.crowd_high_penalty)),
        ("cheap_mode", json!(params.cheap_mode)),
        ("topk_cheap", json!(params.topk_cheap)),
        ("topk_rise", json!(params.topk_rise)),
        ("topk_contrast", json!(params.topk_contrast)),
        ("topk_union", json!(params.topk_union)),
        ("crop_size", json!(params.crop_size)),
        (
            "model_path",
            json!(params.model_path.to_string_lossy().into_owned()),
        ),
    ])
}

/// Computes the cache-invalidation key for a parameter set.
pub fn params_hash(params: &DetectionParameters) -> ParamsHash {
    let fields = hashed_fields(params);
    // A map of JSON scalars always serializes.
    let canonical = serde_json::to_vec(&fields).unwrap_or_default();

    let mut hasher = Hasher::new();
    hasher.update(b"tscan-params-v1|");
    hasher.update(&canonical);
    ParamsHash(*hasher.finalize().as_bytes())
}
