//! Error types for the histo-learning crate.
//!
//! This module defines [`LearningError`], the main error type used throughout
//! the crate. All public API functions return `Result<T, LearningError>`.
//!
//! # Error Handling
//!
//! Errors are designed to be:
//! - **Eager**: every precondition is checked before any fitting starts
//! - **Descriptive**: each variant names the precondition that failed
//! - **Serializable**: front-ends receive `{code, message}` pairs
//!
//! Data-contract failures from `histo-features` are wrapped in
//! [`LearningError::Features`] and keep their original error code.

use histo_features::FeatureError;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for histo-learning operations.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LearningError {
    /// An artifact of the wrong kind was supplied.
    ///
    /// Raised when an untyped input (a file, a front-end payload) turns out to
    /// hold e.g. a trained pipeline where a feature set was expected.
    #[error("Invalid input type: expected {expected}, found {found}")]
    InvalidInputType {
        /// The artifact kind the operation needs.
        expected: String,
        /// The artifact kind that was supplied.
        found: String,
    },

    /// A stored artifact parsed but its parts do not fit together, e.g. a
    /// label code past the last level or a classifier narrower than the reducer.
    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    /// Reduction method or classifier tag is not supported.
    ///
    /// Only `pca` is a valid reduction; only `knn` and `logistic` are valid
    /// classifiers.
    #[error("Unsupported {kind} '{value}'")]
    UnsupportedMethod {
        /// What was being selected ("reduction method" or "classifier").
        kind: String,
        /// The rejected tag.
        value: String,
    },

    /// Requested dimension is outside the permitted range.
    ///
    /// Also raised when new data does not have the feature count a fitted
    /// model was trained on.
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),

    /// Invalid configuration provided to the trainer.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Fitting could not proceed with otherwise valid inputs.
    ///
    /// Common causes:
    /// - only one class present in the training labels
    /// - the decomposition failed to produce components
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    /// Feature or label data violates the data contract.
    #[error(transparent)]
    Features(#[from] FeatureError),

    /// I/O error during artifact, plot or coordinate persistence.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Polars error while exporting projected coordinates.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

impl LearningError {
    /// Shorthand for [`LearningError::UnsupportedMethod`].
    pub fn unsupported(kind: impl Into<String>, value: impl Into<String>) -> Self {
        LearningError::UnsupportedMethod {
            kind: kind.into(),
            value: value.into(),
        }
    }

    /// Get error code for front-end handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInputType { .. } => "INVALID_INPUT_TYPE",
            Self::InvalidArtifact(_) => "INVALID_ARTIFACT",
            Self::UnsupportedMethod { .. } => "UNSUPPORTED_METHOD",
            Self::InvalidDimension(_) => "INVALID_DIMENSION",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::TrainingFailed(_) => "TRAINING_FAILED",
            Self::Features(inner) => inner.error_code(),
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for LearningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("LearningError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for learning operations.
pub type Result<T> = std::result::Result<T, LearningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            LearningError::unsupported("classifier", "svm").error_code(),
            "UNSUPPORTED_METHOD"
        );
        assert_eq!(
            LearningError::InvalidDimension("k=11".to_string()).error_code(),
            "INVALID_DIMENSION"
        );
    }

    #[test]
    fn test_feature_errors_keep_their_code() {
        let err: LearningError = FeatureError::missing_label("training").into();
        assert_eq!(err.error_code(), "MISSING_REQUIRED_LABEL");
        assert!(err.to_string().contains("training"));
    }

    #[test]
    fn test_unsupported_message() {
        let err = LearningError::unsupported("reduction method", "tsne");
        assert_eq!(err.to_string(), "Unsupported reduction method 'tsne'");
    }

    #[test]
    fn test_error_serialization() {
        let err = LearningError::InvalidInputType {
            expected: "feature_label_set".to_string(),
            found: "trained_pipeline".to_string(),
        };
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("INVALID_INPUT_TYPE"));
        assert!(json.contains("trained_pipeline"));
    }
}
