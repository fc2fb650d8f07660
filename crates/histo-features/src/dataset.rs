//! The validated feature/label pairing.
//!
//! A [`FeatureLabelSet`] is built once by [`FeatureLabelSet::load`] (or
//! [`FeatureLabelSet::from_matrix`]) and never mutated afterwards. Every
//! downstream stage can rely on:
//!
//! - at least one row and one column
//! - only finite numeric values
//! - labels, when present, matching the row count
//!
//! Feature columns are renamed `"1"`, `"2"`, ..., `"p"` on load. The original
//! column names are discarded so that embeddings from different extractors
//! line up by position.

use ndarray::{Array2, ArrayView2, Axis};
use polars::prelude::*;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{FeatureError, Result};
use crate::labels::{LabelSource, Labels};
use crate::utils::{finite_f64_values, is_numeric_dtype};

/// Validated numeric features with optional categorical labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFeatureLabelSet")]
pub struct FeatureLabelSet {
    features: Array2<f64>,
    feature_names: Vec<String>,
    labels: Option<Labels>,
}

/// Wire shape of [`FeatureLabelSet`]. Deserialized sets go through
/// [`FeatureLabelSet::from_matrix`] like any other.
#[derive(Deserialize)]
struct RawFeatureLabelSet {
    features: Array2<f64>,
    feature_names: Vec<String>,
    labels: Option<Labels>,
}

impl TryFrom<RawFeatureLabelSet> for FeatureLabelSet {
    type Error = FeatureError;

    fn try_from(raw: RawFeatureLabelSet) -> Result<Self> {
        let set = FeatureLabelSet::from_matrix(raw.features, raw.labels)?;
        if raw.feature_names != set.feature_names {
            return Err(FeatureError::MalformedFeatureData(format!(
                "feature names must be \"1\"..\"{}\", got {} name(s)",
                set.n_features(),
                raw.feature_names.len()
            )));
        }
        Ok(set)
    }
}

// Sets are handed across threads by front-ends.
static_assertions::assert_impl_all!(FeatureLabelSet: Send, Sync);

impl FeatureLabelSet {
    /// Validate a feature table and optional labels.
    ///
    /// Checks run in order and stop at the first failure:
    ///
    /// 1. the table has at least one row and one column
    /// 2. every column is numeric
    /// 3. no value is missing, NaN or infinite
    /// 4. a label table has exactly one column
    /// 5. labels can be coerced to categories
    /// 6. label length equals the row count
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::MalformedFeatureData`] for checks 1-3 and
    /// [`FeatureError::MalformedLabelData`] for checks 4-6.
    pub fn load(feature: &DataFrame, label: Option<LabelSource>) -> Result<Self> {
        let (n_rows, n_cols) = feature.shape();
        if n_rows == 0 || n_cols == 0 {
            return Err(FeatureError::MalformedFeatureData(format!(
                "feature table must have at least one row and one column, got {} x {}",
                n_rows, n_cols
            )));
        }

        for column in feature.get_columns() {
            if !is_numeric_dtype(column.dtype()) {
                return Err(FeatureError::MalformedFeatureData(format!(
                    "column '{}' is not numeric (dtype {})",
                    column.name(),
                    column.dtype()
                )));
            }
        }

        let mut features = Array2::<f64>::zeros((n_rows, n_cols));
        for (j, column) in feature.get_columns().iter().enumerate() {
            let values = finite_f64_values(column, column.name().as_str())?;
            for (i, v) in values.into_iter().enumerate() {
                features[[i, j]] = v;
            }
        }

        let labels = match label {
            Some(source) => Some(labels_for_rows(source, n_rows)?),
            None => None,
        };

        debug!(
            "Loaded feature table {} x {} (labels: {})",
            n_rows,
            n_cols,
            labels.is_some()
        );

        Ok(Self::assemble(features, labels))
    }

    /// Build a set from an already dense matrix.
    ///
    /// Runs the same emptiness, finiteness and label checks as [`load`](Self::load).
    pub fn from_matrix(features: Array2<f64>, labels: Option<Labels>) -> Result<Self> {
        let (n_rows, n_cols) = features.dim();
        if n_rows == 0 || n_cols == 0 {
            return Err(FeatureError::MalformedFeatureData(format!(
                "feature table must have at least one row and one column, got {} x {}",
                n_rows, n_cols
            )));
        }

        if let Some(((row, col), value)) = features.indexed_iter().find(|(_, v)| !v.is_finite())
        {
            let kind = if value.is_nan() { "missing (NaN)" } else { "infinite" };
            return Err(FeatureError::MalformedFeatureData(format!(
                "column '{}' has a {} value at row {}",
                col + 1,
                kind,
                row
            )));
        }

        if let Some(labels) = &labels
            && labels.len() != n_rows
        {
            return Err(length_mismatch(labels.len(), n_rows));
        }

        Ok(Self::assemble(features, labels))
    }

    fn assemble(features: Array2<f64>, labels: Option<Labels>) -> Self {
        let feature_names = (1..=features.ncols()).map(|j| j.to_string()).collect();
        Self {
            features,
            feature_names,
            labels,
        }
    }

    /// Return a new set with `label` attached, replacing any existing labels.
    pub fn with_labels(&self, label: impl Into<LabelSource>) -> Result<Self> {
        let labels = labels_for_rows(label.into(), self.n_samples())?;
        Ok(Self {
            features: self.features.clone(),
            feature_names: self.feature_names.clone(),
            labels: Some(labels),
        })
    }

    /// Feature matrix, rows = samples.
    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    /// Column names, always `"1".."p"`.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn labels(&self) -> Option<&Labels> {
        self.labels.as_ref()
    }

    /// Labels, or [`FeatureError::MissingRequiredLabel`] naming `stage`.
    pub fn require_labels(&self, stage: &str) -> Result<&Labels> {
        self.labels
            .as_ref()
            .ok_or_else(|| FeatureError::missing_label(stage))
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Subset rows by index. Label levels are preserved.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        if indices.is_empty() {
            return Err(FeatureError::MalformedFeatureData(
                "cannot select an empty set of rows".to_string(),
            ));
        }
        if let Some(bad) = indices.iter().find(|&&i| i >= self.n_samples()) {
            return Err(FeatureError::MalformedFeatureData(format!(
                "row index {} out of range for {} sample(s)",
                bad,
                self.n_samples()
            )));
        }
        Ok(Self {
            features: self.features.select(Axis(0), indices),
            feature_names: self.feature_names.clone(),
            labels: self.labels.as_ref().map(|l| l.select(indices)),
        })
    }

    /// Split into `(train, test)` with roughly `test_fraction` of each class in test.
    ///
    /// The split is stratified by label and fully determined by `seed`. Every
    /// class keeps at least one training sample; classes with a single sample
    /// never reach the test side.
    ///
    /// # Errors
    ///
    /// Fails if labels are absent, `test_fraction` is outside `(0, 1)`, or
    /// either side would end up empty.
    pub fn train_test_split(&self, test_fraction: f64, seed: u64) -> Result<(Self, Self)> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(FeatureError::MalformedFeatureData(format!(
                "test fraction must be between 0.0 and 1.0 (exclusive), got {}",
                test_fraction
            )));
        }
        let labels = self.require_labels("splitting")?;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut train_idx = Vec::new();
        let mut test_idx = Vec::new();

        for level in 0..labels.levels().len() {
            let mut members: Vec<usize> = labels
                .codes()
                .iter()
                .enumerate()
                .filter(|&(_, &c)| c == level)
                .map(|(i, _)| i)
                .collect();
            if members.is_empty() {
                continue;
            }
            members.shuffle(&mut rng);

            let n_test = ((members.len() as f64) * test_fraction).round() as usize;
            let n_test = n_test.min(members.len() - 1);
            test_idx.extend_from_slice(&members[..n_test]);
            train_idx.extend_from_slice(&members[n_test..]);
        }

        if test_idx.is_empty() {
            return Err(FeatureError::MalformedFeatureData(format!(
                "test fraction {} leaves the test set empty for {} sample(s)",
                test_fraction,
                self.n_samples()
            )));
        }

        train_idx.sort_unstable();
        test_idx.sort_unstable();

        info!(
            "Split {} samples into {} train / {} test (seed {})",
            self.n_samples(),
            train_idx.len(),
            test_idx.len(),
            seed
        );

        Ok((self.select(&train_idx)?, self.select(&test_idx)?))
    }

    /// Render the features back into a polars frame with `"1".."p"` columns.
    ///
    /// Labels, if any, are appended as a `label` column.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = self
            .feature_names
            .iter()
            .zip(self.features.axis_iter(Axis(1)))
            .map(|(name, values)| Column::new(name.as_str().into(), values.to_vec()))
            .collect();

        if let Some(labels) = &self.labels {
            columns.push(Column::new("label".into(), labels.values()));
        }

        Ok(DataFrame::new(columns)?)
    }
}

fn labels_for_rows(source: LabelSource, n_rows: usize) -> Result<Labels> {
    let values = source.into_strings()?;
    if values.len() != n_rows {
        return Err(length_mismatch(values.len(), n_rows));
    }
    Ok(Labels::from_values(&values))
}

fn length_mismatch(n_labels: usize, n_rows: usize) -> FeatureError {
    FeatureError::MalformedLabelData(format!(
        "label length {} does not match feature row count {}",
        n_labels, n_rows
    ))
}
