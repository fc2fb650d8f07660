//! Configuration types for training.
//!
//! This module provides [`TrainConfig`] and its builder, plus the two closed
//! method tags: [`ReductionMethod`] and [`ClassifierKind`].
//!
//! # Example
//!
//! ```
//! use histo_learning::{ClassifierKind, TrainConfig};
//!
//! let config = TrainConfig::builder()
//!     .dr_k(3)
//!     .classifier(ClassifierKind::Logistic)
//!     .cv_folds(5)
//!     .random_seed(7)
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.dr_k, 3);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LearningError;

/// Dimensionality reduction method.
///
/// PCA is the only supported method; unknown tags are rejected when parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionMethod {
    /// Principal component analysis on centered and scaled features.
    #[default]
    Pca,
}

impl ReductionMethod {
    /// Returns the tag used on the command line and in artifacts.
    ///
    /// ```
    /// use histo_learning::ReductionMethod;
    /// assert_eq!(ReductionMethod::Pca.as_str(), "pca");
    /// ```
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ReductionMethod::Pca => "pca",
        }
    }
}

impl FromStr for ReductionMethod {
    type Err = LearningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pca" => Ok(ReductionMethod::Pca),
            _ => Err(LearningError::unsupported("reduction method", s)),
        }
    }
}

impl fmt::Display for ReductionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supervised classifier applied to the reduced features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    /// k-nearest-neighbors with cross-validated neighbor count.
    #[default]
    Knn,
    /// Multinomial logistic regression with cross-validated weight decay.
    Logistic,
}

impl ClassifierKind {
    /// Returns the tag used on the command line and in artifacts.
    ///
    /// ```
    /// use histo_learning::ClassifierKind;
    /// assert_eq!(ClassifierKind::Knn.as_str(), "knn");
    /// assert_eq!(ClassifierKind::Logistic.as_str(), "logistic");
    /// ```
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierKind::Knn => "knn",
            ClassifierKind::Logistic => "logistic",
        }
    }
}

impl FromStr for ClassifierKind {
    type Err = LearningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "knn" => Ok(ClassifierKind::Knn),
            "logistic" => Ok(ClassifierKind::Logistic),
            _ => Err(LearningError::unsupported("classifier", s)),
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for [`TrainedPipeline::train`](crate::TrainedPipeline::train).
///
/// Use [`TrainConfig::builder()`] to construct a validated configuration.
///
/// # Validation
///
/// The builder validates the following constraints on [`build()`](TrainConfigBuilder::build):
/// - `dr_k` must be at least 1
/// - `cv_folds` must be at least 2
/// - `tune_length` must be at least 1
/// - `max_iter` must be at least 1
/// - `learning_rate` must be positive and finite
///
/// Whether `dr_k` fits the data is only known at fit time and is checked there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Reduction method (default: PCA).
    pub reduction: ReductionMethod,

    /// Requested number of principal components (default: 2).
    pub dr_k: usize,

    /// Classifier to fit on the reduced features (default: k-NN).
    pub classifier: ClassifierKind,

    /// Number of cross-validation folds for hyperparameter selection (default: 10).
    ///
    /// Capped at the number of training samples.
    pub cv_folds: usize,

    /// Number of hyperparameter candidates tried (default: 10).
    pub tune_length: usize,

    /// Seed for fold assignment (default: 42).
    pub random_seed: u64,

    /// Gradient descent iterations for the logistic classifier (default: 500).
    pub max_iter: usize,

    /// Gradient descent step size for the logistic classifier (default: 0.5).
    pub learning_rate: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            reduction: ReductionMethod::default(),
            dr_k: 2,
            classifier: ClassifierKind::default(),
            cv_folds: 10,
            tune_length: 10,
            random_seed: 42,
            max_iter: 500,
            learning_rate: 0.5,
        }
    }
}

impl TrainConfig {
    /// Create a new builder for `TrainConfig`.
    #[must_use]
    pub fn builder() -> TrainConfigBuilder {
        TrainConfigBuilder::default()
    }
}

/// Builder for [`TrainConfig`].
///
/// Created via [`TrainConfig::builder()`]. All setters return `self` to allow
/// method chaining.
#[derive(Debug, Clone, Default)]
pub struct TrainConfigBuilder {
    config: TrainConfig,
}

impl TrainConfigBuilder {
    /// Set the reduction method.
    #[must_use]
    pub fn reduction(mut self, reduction: ReductionMethod) -> Self {
        self.config.reduction = reduction;
        self
    }

    /// Set the requested number of components.
    #[must_use]
    pub fn dr_k(mut self, k: usize) -> Self {
        self.config.dr_k = k;
        self
    }

    /// Set the classifier.
    #[must_use]
    pub fn classifier(mut self, classifier: ClassifierKind) -> Self {
        self.config.classifier = classifier;
        self
    }

    /// Set the number of cross-validation folds.
    ///
    /// [`build()`](Self::build) will return an error if `folds < 2`.
    #[must_use]
    pub fn cv_folds(mut self, folds: usize) -> Self {
        self.config.cv_folds = folds;
        self
    }

    /// Set the number of hyperparameter candidates.
    #[must_use]
    pub fn tune_length(mut self, n: usize) -> Self {
        self.config.tune_length = n;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    /// Set the logistic gradient descent iteration cap.
    #[must_use]
    pub fn max_iter(mut self, n: usize) -> Self {
        self.config.max_iter = n;
        self
    }

    /// Set the logistic gradient descent step size.
    #[must_use]
    pub fn learning_rate(mut self, rate: f64) -> Self {
        self.config.learning_rate = rate;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] for out-of-range settings.
    pub fn build(self) -> Result<TrainConfig, LearningError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl TrainConfig {
    /// Check every constraint listed on [`TrainConfig`].
    ///
    /// Configurations read back from artifacts bypass the builder, so
    /// training re-runs this.
    pub fn validate(&self) -> Result<(), LearningError> {
        if self.dr_k == 0 {
            return Err(LearningError::InvalidConfig(
                "dr_k must be at least 1".to_string(),
            ));
        }

        if self.cv_folds < 2 {
            return Err(LearningError::InvalidConfig(
                "cv_folds must be at least 2".to_string(),
            ));
        }

        if self.tune_length == 0 {
            return Err(LearningError::InvalidConfig(
                "tune_length must be at least 1".to_string(),
            ));
        }

        if self.max_iter == 0 {
            return Err(LearningError::InvalidConfig(
                "max_iter must be at least 1".to_string(),
            ));
        }

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(LearningError::InvalidConfig(
                "learning_rate must be a positive number".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrainConfig::default();
        assert_eq!(config.reduction, ReductionMethod::Pca);
        assert_eq!(config.classifier, ClassifierKind::Knn);
        assert_eq!(config.cv_folds, 10);
        assert_eq!(config.tune_length, 10);
        assert_eq!(config.random_seed, 42);
    }

    #[test]
    fn test_builder_chaining() {
        let config = TrainConfig::builder()
            .reduction(ReductionMethod::Pca)
            .dr_k(4)
            .classifier(ClassifierKind::Logistic)
            .cv_folds(5)
            .tune_length(3)
            .random_seed(123)
            .max_iter(50)
            .learning_rate(0.1)
            .build()
            .unwrap();

        assert_eq!(config.dr_k, 4);
        assert_eq!(config.classifier, ClassifierKind::Logistic);
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.tune_length, 3);
        assert_eq!(config.random_seed, 123);
        assert_eq!(config.max_iter, 50);
        assert!((config.learning_rate - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_settings() {
        let result = TrainConfig::builder().cv_folds(1).build();
        assert!(result.unwrap_err().to_string().contains("cv_folds"));

        let result = TrainConfig::builder().dr_k(0).build();
        assert!(result.unwrap_err().to_string().contains("dr_k"));

        let result = TrainConfig::builder().tune_length(0).build();
        assert!(result.unwrap_err().to_string().contains("tune_length"));

        let result = TrainConfig::builder().learning_rate(f64::NAN).build();
        assert!(result.unwrap_err().to_string().contains("learning_rate"));
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!("PCA".parse::<ReductionMethod>().unwrap(), ReductionMethod::Pca);
        assert_eq!(" knn ".parse::<ClassifierKind>().unwrap(), ClassifierKind::Knn);
        assert_eq!(
            "logistic".parse::<ClassifierKind>().unwrap(),
            ClassifierKind::Logistic
        );
    }

    #[test]
    fn test_unknown_tags_rejected() {
        let err = "umap".parse::<ReductionMethod>().unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_METHOD");

        let err = "svm".parse::<ClassifierKind>().unwrap_err();
        assert!(err.to_string().contains("svm"));
    }

    #[test]
    fn test_tags_serialize_lowercase() {
        let json = serde_json::to_string(&ClassifierKind::Logistic).unwrap();
        assert_eq!(json, "\"logistic\"");
    }
}
