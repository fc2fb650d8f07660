//! Categorical labels.
//!
//! [`Labels`] stores a factor: the sorted distinct values (`levels`) and, per
//! sample, the index of its level (`codes`). [`LabelSource`] covers the shapes a
//! caller may hand in before coercion.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{FeatureError, Result};
use crate::utils::label_strings;

/// Label input accepted by [`FeatureLabelSet::load`](crate::FeatureLabelSet::load).
#[derive(Debug, Clone)]
pub enum LabelSource {
    /// A single polars series.
    Series(Series),
    /// A single polars column.
    Column(Column),
    /// A table; must have exactly one column.
    Table(DataFrame),
    /// Plain string values.
    Values(Vec<String>),
}

impl From<Series> for LabelSource {
    fn from(series: Series) -> Self {
        LabelSource::Series(series)
    }
}

impl From<Column> for LabelSource {
    fn from(column: Column) -> Self {
        LabelSource::Column(column)
    }
}

impl From<DataFrame> for LabelSource {
    fn from(df: DataFrame) -> Self {
        LabelSource::Table(df)
    }
}

impl From<Vec<String>> for LabelSource {
    fn from(values: Vec<String>) -> Self {
        LabelSource::Values(values)
    }
}

impl From<Vec<&str>> for LabelSource {
    fn from(values: Vec<&str>) -> Self {
        LabelSource::Values(values.into_iter().map(str::to_string).collect())
    }
}

impl LabelSource {
    /// Flatten to one string per sample.
    ///
    /// Single-column tables are flattened; wider tables fail.
    pub fn into_strings(self) -> Result<Vec<String>> {
        match self {
            LabelSource::Series(series) => label_strings(&Column::from(series)),
            LabelSource::Column(column) => label_strings(&column),
            LabelSource::Table(df) => {
                if df.width() != 1 {
                    return Err(FeatureError::MalformedLabelData(format!(
                        "label table must have exactly one column, found {}",
                        df.width()
                    )));
                }
                label_strings(&df.get_columns()[0])
            }
            LabelSource::Values(values) => Ok(values),
        }
    }
}

/// A categorical label sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLabels")]
pub struct Labels {
    levels: Vec<String>,
    codes: Vec<usize>,
}

/// Wire shape of [`Labels`]; checked by [`Labels::from_codes`] on the way in.
#[derive(Deserialize)]
struct RawLabels {
    levels: Vec<String>,
    codes: Vec<usize>,
}

impl TryFrom<RawLabels> for Labels {
    type Error = FeatureError;

    fn try_from(raw: RawLabels) -> Result<Self> {
        Labels::from_codes(raw.levels, raw.codes)
    }
}

impl Labels {
    /// Build labels from raw values; levels are the sorted distinct values.
    pub fn from_values<S: AsRef<str>>(values: &[S]) -> Self {
        let levels: Vec<String> = values
            .iter()
            .map(|v| v.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let codes = values
            .iter()
            .map(|v| {
                levels
                    .binary_search_by(|level| level.as_str().cmp(v.as_ref()))
                    .unwrap_or_default()
            })
            .collect();

        Self { levels, codes }
    }

    /// Build labels from explicit levels and codes.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::MalformedLabelData`] if `levels` is not sorted
    /// and distinct, or a code does not index `levels`.
    pub fn from_codes(levels: Vec<String>, codes: Vec<usize>) -> Result<Self> {
        if let Some(pair) = levels.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(FeatureError::MalformedLabelData(format!(
                "label levels must be sorted and distinct, found '{}' before '{}'",
                pair[0], pair[1]
            )));
        }
        if let Some(bad) = codes.iter().find(|&&c| c >= levels.len()) {
            return Err(FeatureError::MalformedLabelData(format!(
                "label code {} is out of range for {} level(s)",
                bad,
                levels.len()
            )));
        }
        Ok(Self { levels, codes })
    }

    /// Distinct label values, sorted.
    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// Level index per sample.
    pub fn codes(&self) -> &[usize] {
        &self.codes
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Label value of sample `i`.
    pub fn value(&self, i: usize) -> &str {
        &self.levels[self.codes[i]]
    }

    /// Label values in sample order.
    pub fn values(&self) -> Vec<&str> {
        self.codes.iter().map(|&c| self.levels[c].as_str()).collect()
    }

    /// Subset by sample indices, keeping the full level set.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            levels: self.levels.clone(),
            codes: indices.iter().map(|&i| self.codes[i]).collect(),
        }
    }

    /// Number of samples per level, in level order.
    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.levels.len()];
        for &c in &self.codes {
            counts[c] += 1;
        }
        counts
    }
}
