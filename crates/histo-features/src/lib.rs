//! Feature/label containers for histopathology embedding analysis.
//!
//! This crate owns the data contract of the analysis pipeline: a numeric
//! embedding table paired with categorical class labels, validated once and
//! immutable afterwards.
//!
//! # Overview
//!
//! - **Validation**: [`FeatureLabelSet::load`] checks shape, dtypes, missing
//!   and infinite values, label shape and label length, in that order
//! - **Labels**: [`Labels`] stores sorted levels plus per-sample codes
//! - **Loading**: [`loader`] reads CSV/TSV exports through polars
//! - **Splitting**: [`FeatureLabelSet::train_test_split`] gives a seeded,
//!   stratified hold-out split
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use histo_features::{FeatureLabelSet, LabelSource};
//! use polars::prelude::*;
//!
//! let features = df!("a" => [0.1, 0.4, 0.9], "b" => [1.0, 0.8, 0.2])?;
//! let set = FeatureLabelSet::load(&features, Some(vec!["tumor", "tumor", "stroma"].into()))?;
//!
//! assert_eq!(set.feature_names(), &["1", "2"]);
//! assert_eq!(set.labels().unwrap().levels(), &["stroma", "tumor"]);
//! ```

pub mod dataset;
pub mod error;
pub mod labels;
pub mod loader;
pub mod utils;

// Re-exports for convenient access
pub use dataset::FeatureLabelSet;
pub use error::{FeatureError, Result as FeatureResult};
pub use labels::{LabelSource, Labels};
pub use loader::{load_with_label_column, load_with_label_file, read_table};
