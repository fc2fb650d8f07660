//! Error types for feature/label loading.
//!
//! Every validation failure in this crate maps to one variant of [`FeatureError`].
//! Errors are serializable so a front-end can display them as `{code, message}`.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for building and manipulating a [`FeatureLabelSet`](crate::FeatureLabelSet).
#[derive(Error, Debug)]
pub enum FeatureError {
    /// Empty table, non-numeric column, missing or infinite value.
    #[error("Malformed feature data: {0}")]
    MalformedFeatureData(String),

    /// Multi-column label, uncoercible label type, or length mismatch.
    #[error("Malformed label data: {0}")]
    MalformedLabelData(String),

    /// Labels are absent but the calling stage needs them.
    #[error("Labels are required for {stage} but none were attached")]
    MissingRequiredLabel { stage: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

impl FeatureError {
    /// Shorthand for [`FeatureError::MissingRequiredLabel`].
    pub fn missing_label(stage: impl Into<String>) -> Self {
        FeatureError::MissingRequiredLabel {
            stage: stage.into(),
        }
    }

    /// Get error code for front-end handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedFeatureData(_) => "MALFORMED_FEATURE_DATA",
            Self::MalformedLabelData(_) => "MALFORMED_LABEL_DATA",
            Self::MissingRequiredLabel { .. } => "MISSING_REQUIRED_LABEL",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for FeatureError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("FeatureError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for feature operations.
pub type Result<T> = std::result::Result<T, FeatureError>;
