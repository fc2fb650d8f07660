//! Scoring a trained pipeline on held-out data.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use histo_features::FeatureLabelSet;

use crate::error::{LearningError, Result};
use crate::metrics::ConfusionMatrix;
use crate::pipeline::TrainedPipeline;
use crate::plot::Plot;

/// Training and test metrics side by side, with rendered heat maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub train_plot: Plot,
    pub train_accuracy: f64,
    pub test_plot: Plot,
    pub test_accuracy: f64,
    pub train_confusion: ConfusionMatrix,
    pub test_confusion: ConfusionMatrix,
}

impl EvaluationResult {
    /// Write `train_confusion.svg` and `test_confusion.svg` into `dir`.
    pub fn save_plots(&self, dir: impl AsRef<Path>) -> Result<(PathBuf, PathBuf)> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let train_path = dir.join("train_confusion.svg");
        let test_path = dir.join("test_confusion.svg");
        self.train_plot.save_svg(&train_path)?;
        self.test_plot.save_svg(&test_path)?;
        Ok((train_path, test_path))
    }
}

/// Apply `pipeline` to `data` and compare predictions with its labels.
///
/// The stored reducer is reused as fitted; nothing is refit. The test
/// confusion matrix spans the union of training and test label levels, so a
/// class that only appears in `data` still gets its own row and column.
///
/// # Errors
///
/// - `MissingRequiredLabel` if `data` has no labels
/// - [`LearningError::InvalidDimension`] if the feature count differs from training
pub fn evaluate(pipeline: &TrainedPipeline, data: &FeatureLabelSet) -> Result<EvaluationResult> {
    let labels = data.require_labels("evaluation")?;
    if data.n_features() != pipeline.n_features() {
        return Err(LearningError::InvalidDimension(format!(
            "pipeline was trained on {} feature column(s), test data has {}",
            pipeline.n_features(),
            data.n_features()
        )));
    }

    info!(
        "Evaluating {} + {} pipeline on {} sample(s) using {} component(s)",
        pipeline.reduction_method(),
        pipeline.classifier_kind(),
        data.n_samples(),
        pipeline.k()
    );

    let predicted = pipeline.predict(data)?;
    let levels = ConfusionMatrix::union_levels(pipeline.levels(), labels.levels());
    let test_confusion = ConfusionMatrix::from_values(levels, &predicted, &labels.values())?;
    let test_accuracy = test_confusion.accuracy();

    let train_confusion = pipeline.train_confusion().clone();
    let train_accuracy = pipeline.train_accuracy();

    info!(
        "Accuracy: train {:.4}, test {:.4}",
        train_accuracy, test_accuracy
    );

    Ok(EvaluationResult {
        train_plot: Plot::ConfusionHeatmap {
            title: format!("Training set (accuracy {:.3})", train_accuracy),
            matrix: train_confusion.clone(),
        },
        train_accuracy,
        test_plot: Plot::ConfusionHeatmap {
            title: format!("Test set (accuracy {:.3})", test_accuracy),
            matrix: test_confusion.clone(),
        },
        test_accuracy,
        train_confusion,
        test_confusion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainConfig;
    use histo_features::Labels;
    use ndarray::Array2;

    fn set(n: usize, shift: f64, labels: &[&str]) -> FeatureLabelSet {
        let x = Array2::from_shape_fn((n, 3), |(i, j)| {
            let base = if labels[i % labels.len()] == "B" { 4.0 } else { 0.0 };
            base + shift + ((i * 5 + j * 2) % 7) as f64 * 0.1
        });
        let values: Vec<&str> = (0..n).map(|i| labels[i % labels.len()]).collect();
        FeatureLabelSet::from_matrix(x, Some(Labels::from_values(&values))).unwrap()
    }

    fn trained() -> TrainedPipeline {
        let config = TrainConfig::builder().cv_folds(4).build().unwrap();
        TrainedPipeline::train(&set(24, 0.0, &["A", "B"]), &config).unwrap()
    }

    #[test]
    fn test_evaluate_reports_both_accuracies() {
        let result = evaluate(&trained(), &set(10, 0.05, &["A", "B"])).unwrap();
        assert!((0.0..=1.0).contains(&result.train_accuracy));
        assert!((0.0..=1.0).contains(&result.test_accuracy));
        assert_eq!(result.test_confusion.total(), 10);
        assert_eq!(result.train_plot.kind(), "confusion_heatmap");
        assert!(result.test_plot.title().starts_with("Test set"));
    }

    #[test]
    fn test_unseen_test_level_is_kept() {
        let result = evaluate(&trained(), &set(6, 0.0, &["A", "B", "C"])).unwrap();
        assert_eq!(result.test_confusion.levels(), &["A", "B", "C"]);
        assert_eq!(result.train_confusion.levels(), &["A", "B"]);
    }

    #[test]
    fn test_feature_count_mismatch_rejected() {
        let narrow = FeatureLabelSet::from_matrix(
            Array2::from_shape_fn((4, 2), |(i, j)| (i + j) as f64),
            Some(Labels::from_values(&["A", "B", "A", "B"])),
        )
        .unwrap();
        let err = evaluate(&trained(), &narrow).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DIMENSION");
    }

    #[test]
    fn test_unlabeled_test_data_rejected() {
        let unlabeled = FeatureLabelSet::from_matrix(Array2::ones((3, 3)), None).unwrap();
        let err = evaluate(&trained(), &unlabeled).unwrap_err();
        assert_eq!(err.error_code(), "MISSING_REQUIRED_LABEL");
    }
}
