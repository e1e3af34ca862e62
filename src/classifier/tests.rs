use super::preprocess::{prepare_batch, resize_bilinear};
use super::*;
use crate::constants::{CLASSIFIER_NORM_MEAN, CLASSIFIER_NORM_STD};
use crate::detection::DetectionParameters;
use std::path::PathBuf;

fn patch_with_center(size: usize, value: f32) -> Patch {
    let mut data = vec![0.0; PATCH_CHANNELS * size * size];
    let c = size / 2;
    data[c * size + c] = value;
    Patch::from_chw(size, data).expect("valid patch")
}

#[test]
fn test_resize_identity() {
    let plane: Vec<f32> = (0..16).map(|v| v as f32).collect();
    assert_eq!(resize_bilinear(&plane, 4, 4), plane);
}

#[test]
fn test_resize_constant_plane_stays_constant() {
    let plane = vec![0.5; 9];
    let out = resize_bilinear(&plane, 3, 7);

    assert_eq!(out.len(), 49);
    assert!(out.iter().all(|v| (v - 0.5).abs() < 1e-6));
}

#[test]
fn test_resize_upsample_interpolates() {
    let plane = vec![0.0, 1.0, 0.0, 1.0];
    let out = resize_bilinear(&plane, 2, 4);

    // Outer columns clamp to the source edges, inner columns blend.
    assert!((out[0] - 0.0).abs() < 1e-6);
    assert!((out[3] - 1.0).abs() < 1e-6);
    assert!((out[1] - 0.25).abs() < 1e-6);
    assert!((out[2] - 0.75).abs() < 1e-6);
}

#[test]
fn test_prepare_batch_normalizes_per_channel() {
    let patch = Patch::zeros(4);
    let batch = prepare_batch(&[patch.clone(), patch], 4).expect("batch");

    assert_eq!(batch.len(), 2 * PATCH_CHANNELS * 16);
    for channel in 0..PATCH_CHANNELS {
        let expected = -CLASSIFIER_NORM_MEAN[channel] / CLASSIFIER_NORM_STD[channel];
        let value = batch[channel * 16];
        assert!((value - expected).abs() < 1e-5);
    }
}

#[test]
fn test_prepare_batch_rejects_empty_patch() {
    let result = prepare_batch(&[Patch::zeros(0)], 4);

    assert!(matches!(result, Err(ClassifierError::InvalidInput { .. })));
}

#[test]
fn test_config_validation() {
    assert!(ClassifierConfig::default().validate().is_ok());

    let zero = ClassifierConfig {
        input_size: 0,
        ..Default::default()
    };
    assert!(zero.validate().is_err());

    let empty_path = ClassifierConfig {
        model_path: Some(PathBuf::new()),
        ..Default::default()
    };
    assert!(empty_path.validate().is_err());
}

#[test]
fn test_config_from_params() {
    let params = DetectionParameters::default();
    assert!(ClassifierConfig::from_params(&params).is_stub());

    let with_model = DetectionParameters {
        model_path: PathBuf::from("/models/best.safetensors"),
        ..Default::default()
    };
    let config = ClassifierConfig::from_params(&with_model);
    assert_eq!(config.model_path, Some(PathBuf::from("/models/best.safetensors")));
}

#[test]
fn test_load_missing_model_fails() {
    let result = CandleClassifier::load(ClassifierConfig::new("/nonexistent/model.safetensors"));
    assert!(matches!(result, Err(ClassifierError::ModelNotFound { .. })));
}

#[test]
fn test_stub_scores_are_deterministic() {
    let classifier = CandleClassifier::stub().expect("stub");
    assert!(!classifier.is_model_loaded());

    let patches = vec![patch_with_center(16, 0.95), patch_with_center(16, 0.1), Patch::zeros(16)];
    let first = classifier.classify(&patches).expect("classify");
    let second = classifier.classify(&patches).expect("classify");

    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    assert!((first[0] - 0.95).abs() < 1e-6);
    assert!((first[1] - 0.1).abs() < 1e-6);
    assert_eq!(first[2], 0.0);
}

#[test]
fn test_resnet_two_class_head_scores_each_patch() {
    let device = Device::Cpu;
    let vb = VarBuilder::zeros(DType::F32, &device);
    let classifier = CandleClassifier {
        device,
        config: ClassifierConfig {
            model_path: None,
            input_size: 32,
        },
        model: Some(build_model(vb).expect("resnet18 builds")),
    };
    assert!(classifier.is_model_loaded());

    let scores = classifier
        .classify(&[patch_with_center(16, 0.9), Patch::zeros(16)])
        .expect("forward pass");

    // Zero weights give equal logits for both classes.
    assert_eq!(scores.len(), 2);
    assert!(scores.iter().all(|s| (s - 0.5).abs() < 1e-6));
}

#[test]
fn test_stub_warm_up_and_empty_batch() {
    let classifier = CandleClassifier::stub().expect("stub");

    assert!(classifier.warm_up().is_ok());
    assert!(classifier.classify(&[]).expect("classify").is_empty());
}

#[test]
fn test_mock_classifier_counts() {
    let mock = MockClassifier::fixed(0.7);

    let scores = mock
        .classify(&[Patch::zeros(4), Patch::zeros(4)])
        .expect("classify");
    assert_eq!(scores, vec![0.7, 0.7]);
    mock.classify(&[Patch::zeros(4)]).expect("classify");

    assert_eq!(mock.call_count(), 2);
    assert_eq!(mock.patch_count(), 3);
    assert_eq!(mock.batch_sizes(), vec![2, 1]);
}

#[test]
fn test_mock_classifier_failing_warm_up() {
    let mock = MockClassifier::failing();

    assert!(matches!(
        mock.warm_up(),
        Err(ClassifierError::InferenceFailed { .. })
    ));
    assert_eq!(mock.call_count(), 1);
}

#[cfg(not(any(feature = "metal", feature = "cuda")))]
#[test]
fn test_cpu_only_build_selects_cpu() {
    assert!(matches!(device::select_device(), Device::Cpu));
}
