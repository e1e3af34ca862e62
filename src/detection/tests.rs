use image::{GrayImage, Luma};

use super::*;
use crate::storage::Candidate;

const BACKGROUND: u8 = 20;

/// Frame with Gaussian spots `(x, y, amplitude, sigma)` over a flat background.
fn frame_with_spots(
    width: u32,
    height: u32,
    background: u8,
    spots: &[(f64, f64, f64, f64)],
) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let mut value = background as f64;
        for &(sx, sy, amplitude, sigma) in spots {
            let r2 = (x as f64 - sx).powi(2) + (y as f64 - sy).powi(2);
            value += amplitude * (-r2 / (2.0 * sigma * sigma)).exp();
        }
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

fn transient_triplet(spots: &[(f64, f64, f64, f64)]) -> FrameTriplet {
    let a = frame_with_spots(200, 160, BACKGROUND, spots);
    let b = a.clone();
    let c = GrayImage::from_pixel(200, 160, Luma([BACKGROUND]));
    FrameTriplet::new(a, b, c).unwrap()
}

fn scored(x: i32, y: i32, cheap: f64, rise: f64, contrast: f64) -> Candidate {
    Candidate {
        cheap_score: cheap,
        rise,
        contrast,
        ..Candidate::detected(x, y)
    }
}

#[test]
fn test_single_spot_scenario() {
    let frames = transient_triplet(&[(120.0, 80.0, 200.0, 2.0)]);
    let params = DetectionParameters {
        thresh: 80,
        min_area: 6.0,
        ..Default::default()
    };

    let extraction = extract_triplet("NGC001", &frames, &params);

    assert_eq!(extraction.n_raw, 1);
    assert_eq!(extraction.crop_rect, CropRect::new(2, 2, 196, 156));
    assert_eq!(extraction.candidates.len(), 1);
    assert_eq!(extraction.patches.len(), 1);

    let candidate = &extraction.candidates[0];
    assert_eq!((candidate.x, candidate.y), (120, 80));
    assert_eq!(candidate.cheap_score, candidate.rise);
    assert!(candidate.rise > 150.0);
    assert!(candidate.ai_score.is_none());
    assert!(!candidate.manual);
    assert_eq!(extraction.patches[0].size(), params.crop_size);
}

#[test]
fn test_blank_triplet_has_no_candidates() {
    let frames = transient_triplet(&[]);

    let extraction = extract_triplet("blank", &frames, &DetectionParameters::default());

    assert_eq!(extraction.n_raw, 0);
    assert!(extraction.is_empty());
    assert!(extraction.patches.is_empty());
}

#[test]
fn test_missing_frame_is_input_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let paths = GroupPaths::new(
        dir.path().join("a.png"),
        dir.path().join("b.png"),
        dir.path().join("c.png"),
    );

    let err = extract_features("ghost", &paths, &DetectionParameters::default()).unwrap_err();

    assert!(err.is_input_error());
    assert!(matches!(err, ExtractionError::Unreadable { role: "a", .. }));
}

#[test]
fn test_extract_features_from_files() {
    let dir = tempfile::TempDir::new().unwrap();
    let frames = transient_triplet(&[(120.0, 80.0, 200.0, 2.0)]);
    let paths = GroupPaths::new(
        dir.path().join("a.png"),
        dir.path().join("b.png"),
        dir.path().join("c.png"),
    );
    frames.a.save(&paths.a).unwrap();
    frames.b.save(&paths.b).unwrap();
    frames.c.save(&paths.c).unwrap();

    let extraction = extract_features("NGC001", &paths, &DetectionParameters::default()).unwrap();

    assert_eq!(extraction.name, "NGC001");
    assert_eq!(extraction.candidates.len(), 1);
}

#[test]
fn test_size_mismatch_is_rejected() {
    let result = FrameTriplet::new(
        GrayImage::new(10, 10),
        GrayImage::new(10, 10),
        GrayImage::new(12, 10),
    );

    assert!(matches!(result, Err(ExtractionError::SizeMismatch { .. })));
}

#[test]
fn test_edge_margin_rejects_border_blobs() {
    let frames = transient_triplet(&[(9.0, 80.0, 200.0, 2.0)]);
    let params = DetectionParameters {
        auto_crop: false,
        ..Default::default()
    };

    assert!(blobs::detect(&frames, &params).is_empty());

    let relaxed = DetectionParameters {
        edge_margin: 0,
        ..params
    };
    assert_eq!(blobs::detect(&frames, &relaxed).len(), 1);
}

#[test]
fn test_blob_touching_frame_border_is_kept_without_margin() {
    let frames = transient_triplet(&[(1.0, 80.0, 200.0, 2.0)]);
    let params = DetectionParameters {
        auto_crop: false,
        edge_margin: 0,
        ..Default::default()
    };

    let found = blobs::detect(&frames, &params);

    assert_eq!(found.len(), 1);
    assert!(found[0].x <= 2);
    assert!((78..=82).contains(&found[0].y));
}

#[test]
fn test_negative_rise_is_rejected() {
    let spot = frame_with_spots(200, 160, BACKGROUND, &[(120.0, 80.0, 200.0, 2.0)]);
    // Brighter in the reference than in the new frame.
    let frames = FrameTriplet::new(
        spot.clone(),
        GrayImage::from_pixel(200, 160, Luma([BACKGROUND])),
        spot,
    )
    .unwrap();

    assert!(blobs::detect(&frames, &DetectionParameters::default()).is_empty());
}

#[test]
fn test_dipole_kill() {
    let mut frames = transient_triplet(&[(120.0, 80.0, 200.0, 2.0)]);
    // Dark subtraction residue right next to the spot.
    for x in 116..119 {
        frames.a.put_pixel(x, 76, Luma([0]));
    }
    let params = DetectionParameters {
        auto_crop: false,
        ..Default::default()
    };

    assert!(blobs::detect(&frames, &params).is_empty());

    let keep = DetectionParameters {
        kill_dipole: false,
        ..params
    };
    assert_eq!(blobs::detect(&frames, &keep).len(), 1);
}

#[test]
fn test_flat_kill_rejects_uniform_square() {
    let mut a = GrayImage::from_pixel(200, 160, Luma([BACKGROUND]));
    for y in 78..83 {
        for x in 118..123 {
            a.put_pixel(x, y, Luma([200]));
        }
    }
    let frames = FrameTriplet::new(
        a.clone(),
        a,
        GrayImage::from_pixel(200, 160, Luma([BACKGROUND])),
    )
    .unwrap();
    let params = DetectionParameters {
        auto_crop: false,
        min_area: 1.0,
        ..Default::default()
    };

    assert!(blobs::detect(&frames, &params).is_empty());

    let keep = DetectionParameters {
        kill_flat: false,
        ..params
    };
    assert_eq!(blobs::detect(&frames, &keep).len(), 1);
}

#[test]
fn test_dynamic_threshold_tracks_background() {
    let a = frame_with_spots(200, 160, 100, &[(120.0, 80.0, 150.0, 2.5)]);
    let frames = FrameTriplet::new(
        a.clone(),
        a,
        GrayImage::from_pixel(200, 160, Luma([100])),
    )
    .unwrap();
    let fixed = DetectionParameters {
        auto_crop: false,
        kill_flat: false,
        min_area: 1.0,
        ..Default::default()
    };

    // The whole frame clears a fixed threshold of 80 and forms one oversized blob.
    assert!(blobs::detect(&frames, &fixed).is_empty());

    let dynamic = DetectionParameters {
        dynamic_thresh: true,
        ..fixed
    };
    let found = blobs::detect(&frames, &dynamic);
    assert_eq!(found.len(), 1);
    assert_eq!((found[0].x, found[0].y), (120, 80));
}

#[test]
fn test_binary_level() {
    let frame = GrayImage::from_pixel(4, 4, Luma([200]));
    let params = DetectionParameters {
        thresh: 80,
        dynamic_thresh: true,
        ..Default::default()
    };

    assert_eq!(blobs::binary_level(&frame, &params), 255.0);
    assert_eq!(
        blobs::binary_level(
            &frame,
            &DetectionParameters {
                dynamic_thresh: false,
                ..params
            }
        ),
        80.0
    );
}

#[test]
fn test_median_u8_even_length_averages() {
    assert_eq!(blobs::median_u8(&mut [1, 9, 3, 7]), 5.0);
    assert_eq!(blobs::median_u8(&mut [4, 1, 2]), 2.0);
    assert_eq!(blobs::median_u8(&mut []), 0.0);
}

#[test]
fn test_robust_z_degenerate_mad() {
    let z = ranking::robust_z(&[5.0, 5.0, 5.0, 8.0]);

    assert_eq!(z, vec![0.0, 0.0, 0.0, 3.0]);
}

#[test]
fn test_robust_z_scaled_by_mad() {
    let z = ranking::robust_z(&[1.0, 2.0, 3.0, 4.0, 5.0]);

    // median 3, MAD 1
    assert!((z[4] - 2.0 / 1.4826).abs() < 1e-9);
    assert_eq!(z[2], 0.0);
}

#[test]
fn test_cheap_score_is_rise_for_few_candidates() {
    let mut candidates: Vec<_> = (0..5)
        .map(|i| Candidate {
            rise: i as f64 * 10.0,
            ..Candidate::detected(i, i)
        })
        .collect();

    ranking::assign_cheap_scores(&mut candidates, CheapMode::RobustZ);

    for c in &candidates {
        assert_eq!(c.cheap_score, c.rise);
    }
}

#[test]
fn test_cheap_score_robust_z_for_many_candidates() {
    let mut candidates: Vec<_> = (0..8)
        .map(|i| Candidate {
            rise: 10.0 + i as f64,
            contrast: 30.0,
            sharp: 2.0,
            area: 12.0,
            ..Candidate::detected(i * 10, 0)
        })
        .collect();

    ranking::assign_cheap_scores(&mut candidates, CheapMode::RobustZ);

    // Only rise varies, so the score is 2 * clipped z(rise).
    let z = ranking::robust_z(&candidates.iter().map(|c| c.rise).collect::<Vec<_>>());
    for (c, z) in candidates.iter().zip(z) {
        assert!((c.cheap_score - 2.0 * z.clamp(-5.0, 5.0)).abs() < 1e-9);
    }
    assert!(candidates[7].cheap_score > candidates[0].cheap_score);

    ranking::assign_cheap_scores(&mut candidates, CheapMode::RiseOnly);
    assert_eq!(candidates[3].cheap_score, candidates[3].rise);
}

#[test]
fn test_top_k_union_of_three_rankings() {
    // Each metric favours a different pair of candidates.
    let candidates = vec![
        scored(0, 0, 9.0, 0.0, 0.0),
        scored(1, 0, 8.0, 0.0, 0.0),
        scored(2, 0, 0.0, 9.0, 0.0),
        scored(3, 0, 0.0, 8.0, 0.0),
        scored(4, 0, 0.0, 0.0, 9.0),
        scored(5, 0, 0.0, 0.0, 8.0),
        scored(6, 0, 1.0, 1.0, 1.0),
    ];
    let params = DetectionParameters {
        topk_cheap: 2,
        topk_rise: 2,
        topk_contrast: 2,
        ..Default::default()
    };

    let selected = ranking::select_top_k(&candidates, &params);
    let xs: Vec<_> = selected.iter().map(|c| c.x).collect();

    assert_eq!(xs, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn test_top_k_union_deduplicates_by_position() {
    let candidates = vec![
        scored(0, 0, 9.0, 9.0, 9.0),
        scored(1, 0, 8.0, 8.0, 8.0),
        scored(2, 0, 1.0, 1.0, 1.0),
    ];
    let params = DetectionParameters {
        topk_cheap: 2,
        topk_rise: 2,
        topk_contrast: 2,
        ..Default::default()
    };

    let selected = ranking::select_top_k(&candidates, &params);

    assert_eq!(selected.len(), 2);
    assert!(selected.len() >= 2 && selected.len() <= 6);
}

#[test]
fn test_top_k_without_union_uses_cheap_score_only() {
    let candidates = vec![
        scored(0, 0, 1.0, 9.0, 9.0),
        scored(1, 0, 3.0, 0.0, 0.0),
        scored(2, 0, 2.0, 0.0, 0.0),
    ];
    let params = DetectionParameters {
        topk_cheap: 2,
        topk_union: false,
        ..Default::default()
    };

    let selected = ranking::select_top_k(&candidates, &params);
    let xs: Vec<_> = selected.iter().map(|c| c.x).collect();

    assert_eq!(xs, vec![1, 2]);
}

#[test]
fn test_patch_is_zero_padded_at_corner() {
    let a = GrayImage::from_pixel(10, 10, Luma([255]));
    let b = GrayImage::from_pixel(10, 10, Luma([51]));
    let c = GrayImage::from_pixel(10, 10, Luma([0]));
    let frames = FrameTriplet::new(a, b, c).unwrap();

    let patch = patch::extract_patch(&frames, 0, 0, 8).unwrap();

    assert_eq!(patch.data().len(), 3 * 8 * 8);
    let diff = patch.channel(0);
    // Window starts at (-4, -4): the top-left 4x4 block is padding.
    assert_eq!(diff[0], 0.0);
    assert_eq!(diff[3 * 8 + 3], 0.0);
    assert_eq!(diff[4 * 8 + 4], 1.0);
    assert!((patch.channel(1)[7 * 8 + 7] - 0.2).abs() < 1e-6);
    assert!(patch.channel(2).iter().all(|&v| v == 0.0));
}

#[test]
fn test_patch_rejects_zero_size() {
    let frames = transient_triplet(&[]);

    assert!(patch::extract_patch(&frames, 5, 5, 0).is_err());
    assert!(Patch::from_chw(0, vec![]).is_none());
    assert!(Patch::from_chw(2, vec![0.0; 12]).is_some());
}
