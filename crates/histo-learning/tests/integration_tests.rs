//! End-to-end tests: load, visualize, train, evaluate, persist.

use histo_learning::{
    Artifact, ClassifierKind, FeatureLabelSet, Labels, LearningError, Plot, ReductionMethod,
    TrainConfig, TrainedPipeline, evaluate, visualize,
};
use ndarray::Array2;
use pretty_assertions::assert_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::path::PathBuf;

// ============================================================================
// Helper Functions
// ============================================================================

/// `n_per_class` samples of class A ~ N(0, 1) and of class B ~ N(3, 1) in `p` dimensions.
fn two_gaussians(n_per_class: usize, p: usize, seed: u64) -> FeatureLabelSet {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let class_a = Normal::new(0.0, 1.0).unwrap();
    let class_b = Normal::new(3.0, 1.0).unwrap();
    let n = 2 * n_per_class;
    let mut x = Array2::<f64>::zeros((n, p));
    let mut values = Vec::with_capacity(n);
    for i in 0..n {
        let (dist, label) = if i < n_per_class { (&class_a, "A") } else { (&class_b, "B") };
        for j in 0..p {
            x[[i, j]] = dist.sample(&mut rng);
        }
        values.push(label);
    }
    FeatureLabelSet::from_matrix(x, Some(Labels::from_values(&values))).unwrap()
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("histo-it-{}-{}", std::process::id(), name))
}

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../histo-features/tests/fixtures")
}

// ============================================================================
// Visualization
// ============================================================================

#[test]
fn test_visualize_three_components_gives_pairs_matrix() {
    let data = two_gaussians(20, 10, 1);
    let plot = visualize(&data, 3, ReductionMethod::Pca).unwrap();
    assert_eq!(plot.kind(), "pairs_matrix");
    assert!(plot.to_svg().contains("<svg"));
}

#[test]
fn test_visualize_two_components_gives_scatter() {
    let data = two_gaussians(20, 10, 1);
    match visualize(&data, 2, ReductionMethod::Pca).unwrap() {
        Plot::Scatter { coordinates, labels, .. } => {
            assert_eq!(coordinates.dim(), (40, 2));
            assert_eq!(labels.len(), 40);
        }
        other => panic!("expected scatter, got {}", other.kind()),
    }
}

#[test]
fn test_visualize_branches_on_retained_components() {
    // Two samples leave room for only two components, whatever was asked for.
    let data = two_gaussians(1, 10, 6);
    match visualize(&data, 5, ReductionMethod::Pca).unwrap() {
        Plot::Scatter { dimensions, .. } => assert_eq!(dimensions, vec!["dim1", "dim2"]),
        other => panic!("expected scatter, got {}", other.kind()),
    }
}

#[test]
fn test_visualize_rejects_out_of_range_dimensions() {
    let data = two_gaussians(20, 10, 1);
    for k in [1, 11] {
        let err = visualize(&data, k, ReductionMethod::Pca).unwrap_err();
        assert!(matches!(err, LearningError::InvalidDimension(_)));
    }
}

// ============================================================================
// Train / Evaluate
// ============================================================================

#[test]
fn test_knn_generalizes_to_fresh_sample() {
    let train = two_gaussians(20, 10, 1);
    let test = two_gaussians(20, 10, 2);

    let config = TrainConfig::builder()
        .dr_k(2)
        .classifier(ClassifierKind::Knn)
        .build()
        .unwrap();
    let pipeline = TrainedPipeline::train(&train, &config).unwrap();
    assert_eq!(pipeline.k(), 2);

    let result = evaluate(&pipeline, &test).unwrap();
    assert!((0.0..=1.0).contains(&result.train_accuracy));
    assert!(result.test_accuracy > 0.7, "test accuracy {}", result.test_accuracy);
    assert_eq!(result.test_confusion.total(), 40);
    assert_eq!(result.test_confusion.levels(), &["A", "B"]);
}

#[test]
fn test_logistic_generalizes_to_fresh_sample() {
    let train = two_gaussians(20, 10, 3);
    let test = two_gaussians(20, 10, 4);

    let config = TrainConfig::builder()
        .dr_k(3)
        .classifier(ClassifierKind::Logistic)
        .build()
        .unwrap();
    let pipeline = TrainedPipeline::train(&train, &config).unwrap();
    let result = evaluate(&pipeline, &test).unwrap();
    assert!(result.test_accuracy > 0.7, "test accuracy {}", result.test_accuracy);
}

#[test]
fn test_clipped_dr_k_carries_through_to_evaluation() {
    let train = two_gaussians(3, 8, 11);
    let test = two_gaussians(3, 8, 12);

    let config = TrainConfig::builder().dr_k(7).build().unwrap();
    let pipeline = TrainedPipeline::train(&train, &config).unwrap();
    assert_eq!(pipeline.requested_dim(), 7);
    assert_eq!(pipeline.k(), 6);
    assert_eq!(pipeline.classifier().n_features(), 6);

    let result = evaluate(&pipeline, &test).unwrap();
    assert_eq!(result.test_confusion.total(), 6);
    assert!((0.0..=1.0).contains(&result.test_accuracy));
}

#[test]
fn test_split_then_train_and_evaluate() {
    let data = two_gaussians(30, 6, 5);
    let (train, test) = data.train_test_split(0.25, 5).unwrap();
    assert_eq!(train.n_samples() + test.n_samples(), 60);

    let config = TrainConfig::builder().cv_folds(5).build().unwrap();
    let pipeline = TrainedPipeline::train(&train, &config).unwrap();
    let result = evaluate(&pipeline, &test).unwrap();
    assert!((0.0..=1.0).contains(&result.test_accuracy));
    assert_eq!(result.test_plot.kind(), "confusion_heatmap");
}

#[test]
fn test_csv_fixture_end_to_end() {
    let data = histo_features::load_with_label_column(
        fixtures_path().join("embeddings_labeled.csv"),
        Some("tissue"),
    )
    .unwrap();

    let config = TrainConfig::builder().dr_k(2).cv_folds(3).build().unwrap();
    let pipeline = TrainedPipeline::train(&data, &config).unwrap();
    let result = evaluate(&pipeline, &data).unwrap();
    assert_eq!(result.test_confusion.total(), 6);
    assert_eq!(result.test_accuracy, result.train_accuracy);
}

// ============================================================================
// Failure Cases
// ============================================================================

#[test]
fn test_dr_k_above_feature_count_fails_before_fitting() {
    let data = two_gaussians(10, 4, 1);
    let config = TrainConfig::builder().dr_k(5).build().unwrap();
    let err = TrainedPipeline::train(&data, &config).unwrap_err();
    assert!(matches!(err, LearningError::InvalidDimension(_)));
}

#[test]
fn test_unknown_method_tags_rejected() {
    let err = "svm".parse::<ClassifierKind>().unwrap_err();
    assert!(matches!(err, LearningError::UnsupportedMethod { .. }));

    let err = "tsne".parse::<ReductionMethod>().unwrap_err();
    assert!(matches!(err, LearningError::UnsupportedMethod { .. }));
}

#[test]
fn test_unlabeled_data_rejected_for_training() {
    let data = two_gaussians(10, 4, 1);
    let unlabeled = FeatureLabelSet::from_matrix(data.features().to_owned(), None).unwrap();
    let err = TrainedPipeline::train(&unlabeled, &TrainConfig::default()).unwrap_err();
    assert_eq!(err.error_code(), "MISSING_REQUIRED_LABEL");
}

#[test]
fn test_corrupted_artifact_rejected_on_load() {
    let data = two_gaussians(2, 3, 1);
    let mut value = serde_json::to_value(Artifact::from(data)).unwrap();
    value["labels"]["codes"][3] = serde_json::json!(7);

    let path = temp_path("corrupt.json");
    std::fs::write(&path, value.to_string()).unwrap();
    let result = Artifact::load(&path);
    std::fs::remove_file(&path).ok();

    let err = result.unwrap_err();
    assert!(err.to_string().contains("out of range"), "{err}");
}

#[test]
fn test_wrong_artifact_kind_rejected() {
    let data = two_gaussians(10, 4, 1);
    let path = temp_path("set.json");
    Artifact::from(data).save(&path).unwrap();

    let err = TrainedPipeline::load(&path).unwrap_err();
    std::fs::remove_file(&path).ok();
    match err {
        LearningError::InvalidInputType { expected, found } => {
            assert_eq!(expected, "trained_pipeline");
            assert_eq!(found, "feature_label_set");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ============================================================================
// Persistence and Reproducibility
// ============================================================================

#[test]
fn test_pipeline_artifact_round_trip() {
    let train = two_gaussians(15, 5, 7);
    let config = TrainConfig::builder().cv_folds(5).build().unwrap();
    let pipeline = TrainedPipeline::train(&train, &config).unwrap();

    let path = temp_path("model.json");
    pipeline.save(&path).unwrap();
    let loaded = TrainedPipeline::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.k(), pipeline.k());
    assert_eq!(loaded.classifier_kind(), ClassifierKind::Knn);
    assert_eq!(loaded.predict(&train).unwrap(), pipeline.predict(&train).unwrap());
}

#[test]
fn test_same_seed_same_split_and_hyperparameters() {
    let data = two_gaussians(25, 8, 9);

    let (train_a, test_a) = data.train_test_split(0.3, 21).unwrap();
    let (train_b, test_b) = data.train_test_split(0.3, 21).unwrap();
    assert_eq!(train_a, train_b);
    assert_eq!(test_a, test_b);

    let config = TrainConfig::builder()
        .classifier(ClassifierKind::Logistic)
        .random_seed(21)
        .build()
        .unwrap();
    let a = TrainedPipeline::train(&train_a, &config).unwrap();
    let b = TrainedPipeline::train(&train_b, &config).unwrap();
    assert_eq!(a.classifier().profile(), b.classifier().profile());
    assert_eq!(a.train_accuracy(), b.train_accuracy());
}
