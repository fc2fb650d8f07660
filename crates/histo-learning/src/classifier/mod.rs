//! Supervised classifiers on reduced features.
//!
//! [`Classifier`] is a closed union over the two supported models. Both pick
//! one hyperparameter by stratified cross-validation ([`cv`]) and then refit
//! on the full training data:
//!
//! | Variant | Tuned parameter | Grid |
//! |---------|-----------------|------|
//! | [`KnnModel`] | neighbor count | `5, 7, ..., 5 + 2(tune_length - 1)` |
//! | [`LogisticModel`] | L2 weight decay | `0` and log-spaced `1e-1 ..= 1e-4` |
//!
//! Predictions are level indices into the training label levels.

pub mod cv;
pub mod knn;
pub mod logistic;

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use tracing::info;

use histo_features::Labels;

use crate::config::{ClassifierKind, TrainConfig};
use crate::error::{LearningError, Result};

pub use cv::CvProfile;
pub use knn::KnnModel;
pub use logistic::LogisticModel;

/// A fitted classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum Classifier {
    Knn(KnnModel),
    Logistic(LogisticModel),
}

impl Classifier {
    /// Fit the model selected by `kind` on `x` (rows = samples) and `labels`.
    ///
    /// # Errors
    ///
    /// - [`LearningError::InvalidDimension`] if `x` and `labels` disagree on length
    /// - [`LearningError::TrainingFailed`] if fewer than two classes are present
    pub fn fit(
        kind: ClassifierKind,
        x: ArrayView2<'_, f64>,
        labels: &Labels,
        config: &TrainConfig,
    ) -> Result<Self> {
        if x.nrows() != labels.len() {
            return Err(LearningError::InvalidDimension(format!(
                "{} feature row(s) but {} label(s)",
                x.nrows(),
                labels.len()
            )));
        }

        let present = labels.counts().iter().filter(|&&c| c > 0).count();
        if present < 2 {
            return Err(LearningError::TrainingFailed(format!(
                "at least two classes are required, found {}",
                present
            )));
        }

        info!(
            "Fitting {} classifier on {} x {} reduced features, {} class(es)",
            kind,
            x.nrows(),
            x.ncols(),
            labels.levels().len()
        );

        let n_levels = labels.levels().len();
        let model = match kind {
            ClassifierKind::Knn => {
                Classifier::Knn(KnnModel::fit(x, labels.codes(), n_levels, config)?)
            }
            ClassifierKind::Logistic => {
                Classifier::Logistic(LogisticModel::fit(x, labels.codes(), n_levels, config)?)
            }
        };
        Ok(model)
    }

    /// Predicted level index per row of `x`.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        if x.ncols() != self.n_features() {
            return Err(LearningError::InvalidDimension(format!(
                "classifier expects {} input column(s), got {}",
                self.n_features(),
                x.ncols()
            )));
        }
        Ok(match self {
            Classifier::Knn(model) => model.predict(x),
            Classifier::Logistic(model) => model.predict(x),
        })
    }

    pub fn kind(&self) -> ClassifierKind {
        match self {
            Classifier::Knn(_) => ClassifierKind::Knn,
            Classifier::Logistic(_) => ClassifierKind::Logistic,
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            Classifier::Knn(model) => model.n_features(),
            Classifier::Logistic(model) => model.n_features(),
        }
    }

    /// Number of class levels the predicted indices range over.
    pub fn n_levels(&self) -> usize {
        match self {
            Classifier::Knn(model) => model.n_levels(),
            Classifier::Logistic(model) => model.intercepts().len(),
        }
    }

    /// Cross-validation results behind the selected hyperparameter.
    pub fn profile(&self) -> &CvProfile {
        match self {
            Classifier::Knn(model) => model.profile(),
            Classifier::Logistic(model) => model.profile(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    fn line_data() -> (Array2<f64>, Labels) {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| if i < 10 { i as f64 } else { 20.0 + i as f64 });
        let values: Vec<&str> = (0..20).map(|i| if i < 10 { "low" } else { "high" }).collect();
        (x, Labels::from_values(&values))
    }

    #[test]
    fn test_fit_dispatches_on_kind() {
        let (x, labels) = line_data();
        let config = TrainConfig::builder().cv_folds(5).tune_length(3).build().unwrap();

        let knn = Classifier::fit(ClassifierKind::Knn, x.view(), &labels, &config).unwrap();
        assert_eq!(knn.kind(), ClassifierKind::Knn);
        assert_eq!(knn.profile().parameter, "k_neighbors");
        assert_eq!(knn.n_levels(), 2);

        let logistic = Classifier::fit(ClassifierKind::Logistic, x.view(), &labels, &config).unwrap();
        assert_eq!(logistic.kind(), ClassifierKind::Logistic);
        assert_eq!(logistic.profile().parameter, "decay");
        assert_eq!(logistic.n_levels(), 2);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = array![[1.0], [2.0], [3.0]];
        let labels = Labels::from_values(&["A", "A", "A"]);
        let err = Classifier::fit(ClassifierKind::Knn, x.view(), &labels, &TrainConfig::default())
            .unwrap_err();
        assert_eq!(err.error_code(), "TRAINING_FAILED");
    }

    #[test]
    fn test_predict_checks_width() {
        let (x, labels) = line_data();
        let config = TrainConfig::builder().cv_folds(5).build().unwrap();
        let model = Classifier::fit(ClassifierKind::Knn, x.view(), &labels, &config).unwrap();
        let err = model.predict(array![[1.0, 2.0]].view()).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DIMENSION");
    }

    #[test]
    fn test_classifier_serializes_with_model_tag() {
        let (x, labels) = line_data();
        let config = TrainConfig::builder().cv_folds(5).tune_length(2).build().unwrap();
        let model = Classifier::fit(ClassifierKind::Logistic, x.view(), &labels, &config).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains("\"model\":\"logistic\""));
        let back: Classifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind(), ClassifierKind::Logistic);
        assert_eq!(back.predict(x.view()).unwrap(), model.predict(x.view()).unwrap());
    }
}
