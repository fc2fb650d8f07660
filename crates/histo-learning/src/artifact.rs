//! Tagged on-disk artifacts.
//!
//! Files and front-end payloads arrive untyped. [`Artifact`] carries a `kind`
//! tag so the type is checked exactly once, on entry, and the rest of the
//! code works with concrete [`FeatureLabelSet`] / [`TrainedPipeline`] values.
//!
//! ```json
//! { "kind": "feature_label_set", "features": { ... }, "feature_names": [...], "labels": { ... } }
//! ```

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::debug;

use histo_features::FeatureLabelSet;

use crate::error::{LearningError, Result};
use crate::pipeline::TrainedPipeline;

const FEATURE_LABEL_SET: &str = "feature_label_set";
const TRAINED_PIPELINE: &str = "trained_pipeline";

/// Either artifact the tools exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    FeatureLabelSet(FeatureLabelSet),
    TrainedPipeline(Box<TrainedPipeline>),
}

impl Artifact {
    /// The `kind` tag of this artifact.
    pub fn kind(&self) -> &'static str {
        match self {
            Artifact::FeatureLabelSet(_) => FEATURE_LABEL_SET,
            Artifact::TrainedPipeline(_) => TRAINED_PIPELINE,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse an artifact, reporting an unknown or missing tag as
    /// [`LearningError::InvalidInputType`].
    pub fn from_json(text: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(text)?)
    }

    fn from_value(value: serde_json::Value) -> Result<Self> {
        let kind = value
            .get("kind")
            .and_then(|k| k.as_str())
            .unwrap_or("<untagged>")
            .to_string();

        if kind != FEATURE_LABEL_SET && kind != TRAINED_PIPELINE {
            return Err(LearningError::InvalidInputType {
                expected: format!("{} or {}", FEATURE_LABEL_SET, TRAINED_PIPELINE),
                found: kind,
            });
        }

        Ok(serde_json::from_value(value)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        debug!("Wrote {} artifact to {}", self.kind(), path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let value: serde_json::Value = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        let artifact = Self::from_value(value)?;
        debug!("Read {} artifact from {}", artifact.kind(), path.display());
        Ok(artifact)
    }

    pub fn into_feature_set(self) -> Result<FeatureLabelSet> {
        match self {
            Artifact::FeatureLabelSet(set) => Ok(set),
            other => Err(LearningError::InvalidInputType {
                expected: FEATURE_LABEL_SET.to_string(),
                found: other.kind().to_string(),
            }),
        }
    }

    pub fn into_pipeline(self) -> Result<TrainedPipeline> {
        match self {
            Artifact::TrainedPipeline(pipeline) => Ok(*pipeline),
            other => Err(LearningError::InvalidInputType {
                expected: TRAINED_PIPELINE.to_string(),
                found: other.kind().to_string(),
            }),
        }
    }
}

impl From<FeatureLabelSet> for Artifact {
    fn from(set: FeatureLabelSet) -> Self {
        Artifact::FeatureLabelSet(set)
    }
}

impl From<TrainedPipeline> for Artifact {
    fn from(pipeline: TrainedPipeline) -> Self {
        Artifact::TrainedPipeline(Box::new(pipeline))
    }
}
