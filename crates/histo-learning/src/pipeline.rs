//! Training: reducer + classifier assembled into a reusable model.
//!
//! ```rust,ignore
//! use histo_learning::{ClassifierKind, TrainConfig, TrainedPipeline};
//!
//! let config = TrainConfig::builder()
//!     .dr_k(2)
//!     .classifier(ClassifierKind::Knn)
//!     .build()?;
//! let pipeline = TrainedPipeline::train(&training_set, &config)?;
//! println!("training accuracy: {:.3}", pipeline.train_accuracy());
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use histo_features::FeatureLabelSet;

use crate::artifact::Artifact;
use crate::classifier::Classifier;
use crate::config::{ClassifierKind, ReductionMethod, TrainConfig};
use crate::error::{LearningError, Result};
use crate::metrics::ConfusionMatrix;
use crate::reduction::DimensionalityReducer;

/// A fitted reducer and classifier with their training metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTrainedPipeline")]
pub struct TrainedPipeline {
    config: TrainConfig,
    reducer: DimensionalityReducer,
    classifier: Classifier,
    n_features: usize,
    levels: Vec<String>,
    train_confusion: ConfusionMatrix,
    train_accuracy: f64,
}

static_assertions::assert_impl_all!(TrainedPipeline: Send, Sync);

/// Wire shape of [`TrainedPipeline`]. Each part is checked on its own while
/// parsing; the conversion checks that the parts agree with each other.
#[derive(Deserialize)]
struct RawTrainedPipeline {
    config: TrainConfig,
    reducer: DimensionalityReducer,
    classifier: Classifier,
    n_features: usize,
    levels: Vec<String>,
    train_confusion: ConfusionMatrix,
    train_accuracy: f64,
}

impl TryFrom<RawTrainedPipeline> for TrainedPipeline {
    type Error = LearningError;

    fn try_from(raw: RawTrainedPipeline) -> Result<Self> {
        raw.config.validate()?;
        if raw.reducer.n_features() != raw.n_features {
            return Err(LearningError::InvalidArtifact(format!(
                "reducer expects {} feature column(s) but the pipeline records {}",
                raw.reducer.n_features(),
                raw.n_features
            )));
        }
        if raw.classifier.n_features() != raw.reducer.k() {
            return Err(LearningError::InvalidArtifact(format!(
                "classifier expects {} input column(s) but the reducer keeps {}",
                raw.classifier.n_features(),
                raw.reducer.k()
            )));
        }
        if raw.classifier.n_levels() != raw.levels.len() || raw.train_confusion.levels() != raw.levels
        {
            return Err(LearningError::InvalidArtifact(format!(
                "classifier predicts {} level(s) but the pipeline records {:?}",
                raw.classifier.n_levels(),
                raw.levels
            )));
        }
        if !(0.0..=1.0).contains(&raw.train_accuracy) {
            return Err(LearningError::InvalidArtifact(format!(
                "training accuracy {} is outside [0, 1]",
                raw.train_accuracy
            )));
        }
        Ok(Self {
            config: raw.config,
            reducer: raw.reducer,
            classifier: raw.classifier,
            n_features: raw.n_features,
            levels: raw.levels,
            train_confusion: raw.train_confusion,
            train_accuracy: raw.train_accuracy,
        })
    }
}

impl TrainedPipeline {
    /// Fit the reducer, fit the classifier on the projection, and score the
    /// training data.
    ///
    /// # Errors
    ///
    /// - [`LearningError::InvalidConfig`] if `config` is out of range
    /// - `MissingRequiredLabel` if `data` has no labels
    /// - [`LearningError::InvalidDimension`] if `config.dr_k` exceeds the feature count
    /// - [`LearningError::TrainingFailed`] if fewer than two classes are present
    pub fn train(data: &FeatureLabelSet, config: &TrainConfig) -> Result<Self> {
        config.validate()?;
        let labels = data.require_labels("training")?;

        info!(
            "Training {} + {} pipeline on {} x {} features (dr_k = {})",
            config.reduction,
            config.classifier,
            data.n_samples(),
            data.n_features(),
            config.dr_k
        );

        let (reducer, scores) =
            DimensionalityReducer::fit(config.reduction, data.features(), config.dr_k)?;
        let classifier = Classifier::fit(config.classifier, scores.view(), labels, config)?;

        let predicted = classifier.predict(scores.view())?;
        let levels = labels.levels().to_vec();
        let predicted_values: Vec<&str> = predicted.iter().map(|&c| levels[c].as_str()).collect();
        let train_confusion =
            ConfusionMatrix::from_values(levels.clone(), &predicted_values, &labels.values())?;
        let train_accuracy = train_confusion.accuracy();

        info!(
            "Training accuracy {:.4} with {} = {}",
            train_accuracy,
            classifier.profile().parameter,
            classifier.profile().best_candidate()
        );

        Ok(Self {
            config: config.clone(),
            reducer,
            classifier,
            n_features: data.n_features(),
            levels,
            train_confusion,
            train_accuracy,
        })
    }

    /// Predicted label per sample of `data`, using the stored reducer.
    pub fn predict(&self, data: &FeatureLabelSet) -> Result<Vec<String>> {
        if data.n_features() != self.n_features {
            return Err(LearningError::InvalidDimension(format!(
                "pipeline was trained on {} feature column(s), got {}",
                self.n_features,
                data.n_features()
            )));
        }
        let scores = self.reducer.transform(data.features())?;
        let predicted = self.classifier.predict(scores.view())?;
        Ok(predicted
            .into_iter()
            .map(|c| self.levels[c].clone())
            .collect())
    }

    pub fn reducer(&self) -> &DimensionalityReducer {
        &self.reducer
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn reduction_method(&self) -> ReductionMethod {
        self.reducer.method()
    }

    pub fn classifier_kind(&self) -> ClassifierKind {
        self.classifier.kind()
    }

    /// Number of components requested at training time.
    pub fn requested_dim(&self) -> usize {
        self.config.dr_k
    }

    /// Number of components actually retained. Evaluation uses this.
    pub fn k(&self) -> usize {
        self.reducer.k()
    }

    /// Feature count of the training data.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Class levels seen during training.
    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn train_confusion(&self) -> &ConfusionMatrix {
        &self.train_confusion
    }

    pub fn train_accuracy(&self) -> f64 {
        self.train_accuracy
    }

    /// Write the pipeline as a tagged JSON artifact.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        Artifact::TrainedPipeline(Box::new(self.clone())).save(path)
    }

    /// Read a pipeline artifact, rejecting other artifact kinds.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Artifact::load(path)?.into_pipeline()
    }
}
