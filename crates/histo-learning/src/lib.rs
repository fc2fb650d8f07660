//! histo-learning: PCA, classification and evaluation for histopathology embeddings.
//!
//! This crate takes a validated [`FeatureLabelSet`] from `histo-features`,
//! reduces it with PCA, trains a k-NN or logistic classifier on the reduced
//! features and scores the result on held-out data.
//!
//! # Features
//!
//! - **Dimensionality reduction**: scaled PCA with a reusable, never-refit projection
//! - **Classifiers**: k-NN and multinomial logistic regression, each tuned by
//!   stratified k-fold cross-validation
//! - **Evaluation**: confusion matrices (predicted x true) and accuracy
//! - **Plots**: scatter, pairs matrix and confusion heat map, rendered as SVG
//! - **Artifacts**: tagged JSON files for feature sets and trained pipelines
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use histo_learning::{evaluate, visualize, ClassifierKind, ReductionMethod, TrainConfig, TrainedPipeline};
//!
//! let (train, test) = data.train_test_split(0.25, 42)?;
//!
//! let plot = visualize(&train, 3, ReductionMethod::Pca)?;
//! plot.save_svg("pairs.svg")?;
//!
//! let config = TrainConfig::builder()
//!     .dr_k(2)
//!     .classifier(ClassifierKind::Knn)
//!     .build()?;
//! let pipeline = TrainedPipeline::train(&train, &config)?;
//!
//! let result = evaluate(&pipeline, &test)?;
//! println!("test accuracy: {:.3}", result.test_accuracy);
//! ```
//!
//! # Architecture
//!
//! ```text
//! FeatureLabelSet ──► DimensionalityReducer::fit ──► Classifier::fit ──► TrainedPipeline
//!                                                                             │
//! FeatureLabelSet (held out) ────────────────────────────────► evaluate ◄────┘
//!                                                                  │
//!                                                   EvaluationResult + heat maps
//! ```
//!
//! [`visualize`] runs independently on any labelled set.

pub mod artifact;
pub mod classifier;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod metrics;
pub mod pipeline;
pub mod plot;
pub mod preprocess;
pub mod reduction;
pub mod visualize;

// Re-exports for convenient access
pub use artifact::Artifact;
pub use classifier::{Classifier, CvProfile, KnnModel, LogisticModel};
pub use config::{ClassifierKind, ReductionMethod, TrainConfig, TrainConfigBuilder};
pub use error::{LearningError, Result};
pub use evaluation::{EvaluationResult, evaluate};
pub use metrics::ConfusionMatrix;
pub use pipeline::TrainedPipeline;
pub use plot::Plot;
pub use reduction::{DimensionalityReducer, PcaModel};
pub use visualize::visualize;

pub use histo_features::{FeatureLabelSet, LabelSource, Labels};
