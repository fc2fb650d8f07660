//! Column-wise centering and scaling.
//!
//! Both the reducer and the classifiers standardize their inputs. The reducer
//! refuses constant columns; the classifiers leave them unscaled, since a
//! cross-validation fold can easily end up with a column that does not vary.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{LearningError, Result};

/// Per-column mean and sample standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStandardizer")]
pub struct Standardizer {
    means: Array1<f64>,
    scales: Array1<f64>,
}

#[derive(Deserialize)]
struct RawStandardizer {
    means: Array1<f64>,
    scales: Array1<f64>,
}

impl TryFrom<RawStandardizer> for Standardizer {
    type Error = LearningError;

    fn try_from(raw: RawStandardizer) -> Result<Self> {
        if raw.means.len() != raw.scales.len() {
            return Err(LearningError::InvalidArtifact(format!(
                "standardizer has {} mean(s) but {} scale(s)",
                raw.means.len(),
                raw.scales.len()
            )));
        }
        if raw.means.iter().any(|m| !m.is_finite())
            || raw.scales.iter().any(|s| !s.is_finite() || *s < 0.0)
        {
            return Err(LearningError::InvalidArtifact(
                "standardizer means must be finite and scales finite and non-negative".to_string(),
            ));
        }
        Ok(Self {
            means: raw.means,
            scales: raw.scales,
        })
    }
}

impl Standardizer {
    /// Estimate column statistics from `x`.
    ///
    /// Columns with zero (or undefined, for a single row) sample standard
    /// deviation get a scale of `0.0`; see [`constant_columns`](Self::constant_columns).
    pub fn fit(x: ArrayView2<'_, f64>) -> Self {
        let n = x.nrows();
        let means = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(x.ncols()));

        let scales = if n < 2 {
            Array1::zeros(x.ncols())
        } else {
            x.std_axis(Axis(0), 1.0)
        };

        Self { means, scales }
    }

    /// Indices of columns that cannot be scaled.
    pub fn constant_columns(&self) -> Vec<usize> {
        self.scales
            .iter()
            .enumerate()
            .filter(|&(_, &s)| s <= f64::EPSILON)
            .map(|(j, _)| j)
            .collect()
    }

    /// Replace unusable scales with `1.0` so those columns are only centered.
    pub fn tolerate_constant_columns(mut self) -> Self {
        self.scales.mapv_inplace(|s| if s > f64::EPSILON { s } else { 1.0 });
        self
    }

    /// Number of columns the statistics were estimated on.
    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }

    pub fn scales(&self) -> &Array1<f64> {
        &self.scales
    }

    /// Apply `(x - mean) / scale` column-wise.
    ///
    /// Callers are responsible for the column count matching [`n_features`](Self::n_features).
    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut out = x.to_owned();
        for (mut column, (&mean, &scale)) in out
            .axis_iter_mut(Axis(1))
            .zip(self.means.iter().zip(self.scales.iter()))
        {
            let scale = if scale > f64::EPSILON { scale } else { 1.0 };
            column.mapv_inplace(|v| (v - mean) / scale);
        }
        out
    }
}
