//! Dimensionality reduction.
//!
//! [`DimensionalityReducer`] wraps a fitted projection. Only PCA exists today;
//! the enum keeps the method closed and lets artifacts record which one was
//! fitted.
//!
//! PCA here is the scaled variant: every column is centered and divided by
//! its sample standard deviation before the decomposition, and the same
//! statistics are reapplied to any data projected later.

use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use histo_features::FeatureError;

use crate::config::ReductionMethod;
use crate::error::{LearningError, Result};
use crate::preprocess::Standardizer;

/// A fitted dimensionality reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum DimensionalityReducer {
    Pca(PcaModel),
}

impl DimensionalityReducer {
    /// Fit `method` on `features` and return the model with the projected
    /// training matrix (`n x k`).
    ///
    /// # Errors
    ///
    /// - [`LearningError::InvalidDimension`] if `k_requested` is 0 or exceeds
    ///   the number of feature columns
    /// - [`FeatureError::MalformedFeatureData`] (wrapped) for a constant column
    pub fn fit(
        method: ReductionMethod,
        features: ArrayView2<'_, f64>,
        k_requested: usize,
    ) -> Result<(Self, Array2<f64>)> {
        match method {
            ReductionMethod::Pca => {
                let (model, scores) = PcaModel::fit(features, k_requested)?;
                Ok((DimensionalityReducer::Pca(model), scores))
            }
        }
    }

    /// Project new data with the stored parameters. Never refits.
    pub fn transform(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        match self {
            DimensionalityReducer::Pca(model) => model.transform(features),
        }
    }

    pub fn method(&self) -> ReductionMethod {
        match self {
            DimensionalityReducer::Pca(_) => ReductionMethod::Pca,
        }
    }

    /// Number of retained components.
    pub fn k(&self) -> usize {
        match self {
            DimensionalityReducer::Pca(model) => model.k(),
        }
    }

    /// Feature count the reducer was fitted on.
    pub fn n_features(&self) -> usize {
        match self {
            DimensionalityReducer::Pca(model) => model.n_features(),
        }
    }

    /// Names of the projected columns: `dim1`, `dim2`, ...
    pub fn component_names(&self) -> Vec<String> {
        (1..=self.k()).map(|i| format!("dim{i}")).collect()
    }
}

/// Principal components of the standardized feature matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPcaModel")]
pub struct PcaModel {
    scaler: Standardizer,
    /// `p x k`, one component per column.
    loadings: Array2<f64>,
    explained_variance: Array1<f64>,
    total_variance: f64,
}

#[derive(Deserialize)]
struct RawPcaModel {
    scaler: Standardizer,
    loadings: Array2<f64>,
    explained_variance: Array1<f64>,
    total_variance: f64,
}

impl TryFrom<RawPcaModel> for PcaModel {
    type Error = LearningError;

    fn try_from(raw: RawPcaModel) -> Result<Self> {
        let (p, k) = raw.loadings.dim();
        if k == 0 || p != raw.scaler.n_features() || raw.explained_variance.len() != k {
            return Err(LearningError::InvalidArtifact(format!(
                "PCA loadings are {} x {} for a scaler over {} column(s) and {} variance(s)",
                p,
                k,
                raw.scaler.n_features(),
                raw.explained_variance.len()
            )));
        }
        Ok(Self {
            scaler: raw.scaler,
            loadings: raw.loadings,
            explained_variance: raw.explained_variance,
            total_variance: raw.total_variance,
        })
    }
}

impl PcaModel {
    /// Fit on `features` keeping up to `k_requested` components.
    ///
    /// The number kept is `min(k_requested, n_samples, n_features)`.
    pub fn fit(features: ArrayView2<'_, f64>, k_requested: usize) -> Result<(Self, Array2<f64>)> {
        let (n, p) = features.dim();

        if k_requested == 0 || k_requested > p {
            return Err(LearningError::InvalidDimension(format!(
                "requested {} component(s) but the data has {} feature column(s)",
                k_requested, p
            )));
        }

        let scaler = Standardizer::fit(features);
        if let Some(&j) = scaler.constant_columns().first() {
            return Err(FeatureError::MalformedFeatureData(format!(
                "column '{}' has zero variance and cannot be scaled",
                j + 1
            ))
            .into());
        }

        let k = k_requested.min(n.min(p));
        if k < k_requested {
            warn!(
                "Requested {} components but only {} are available for {} x {} data; keeping {}",
                k_requested,
                n.min(p),
                n,
                p,
                k
            );
        }

        let z = scaler.transform(features);
        let matrix = DMatrix::from_fn(n, p, |i, j| z[[i, j]]);
        let svd = matrix.svd(false, true);
        let v_t = svd.v_t.ok_or_else(|| {
            LearningError::TrainingFailed("SVD did not return right singular vectors".to_string())
        })?;

        let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
        order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));

        let denom = (n.saturating_sub(1)).max(1) as f64;
        let total_variance: f64 = svd.singular_values.iter().map(|s| s * s / denom).sum();

        let mut loadings = Array2::<f64>::zeros((p, k));
        let mut explained_variance = Array1::<f64>::zeros(k);
        for (c, &idx) in order.iter().take(k).enumerate() {
            let row = v_t.row(idx);

            // Largest-magnitude loading is positive.
            let pivot = row
                .iter()
                .copied()
                .fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
            let sign = if pivot < 0.0 { -1.0 } else { 1.0 };

            for j in 0..p {
                loadings[[j, c]] = sign * row[(0, j)];
            }
            let s = svd.singular_values[idx];
            explained_variance[c] = s * s / denom;
        }

        let model = Self {
            scaler,
            loadings,
            explained_variance,
            total_variance,
        };
        let scores = z.dot(&model.loadings);

        info!(
            "Fitted PCA on {} x {} features, kept {} component(s) explaining {:.1}% of variance",
            n,
            p,
            k,
            model.explained_variance_ratio().sum() * 100.0
        );
        debug!("Explained variance per component: {:?}", model.explained_variance.to_vec());

        Ok((model, scores))
    }

    pub fn transform(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if features.ncols() != self.n_features() {
            return Err(LearningError::InvalidDimension(format!(
                "reducer was fitted on {} feature column(s), got {}",
                self.n_features(),
                features.ncols()
            )));
        }
        Ok(self.scaler.transform(features).dot(&self.loadings))
    }

    pub fn k(&self) -> usize {
        self.loadings.ncols()
    }

    pub fn n_features(&self) -> usize {
        self.loadings.nrows()
    }

    /// Component loadings, `p x k`.
    pub fn loadings(&self) -> &Array2<f64> {
        &self.loadings
    }

    /// Variance of each retained component in standardized units.
    pub fn explained_variance(&self) -> &Array1<f64> {
        &self.explained_variance
    }

    /// Share of the total standardized variance per retained component.
    pub fn explained_variance_ratio(&self) -> Array1<f64> {
        if self.total_variance > 0.0 {
            &self.explained_variance / self.total_variance
        } else {
            Array1::zeros(self.k())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Axis, array};

    fn correlated() -> Array2<f64> {
        array![
            [2.5, 2.4, 0.5],
            [0.5, 0.7, 1.9],
            [2.2, 2.9, 0.8],
            [1.9, 2.2, 1.1],
            [3.1, 3.0, 0.2],
            [2.3, 2.7, 0.9],
            [2.0, 1.6, 1.4],
            [1.0, 1.1, 1.8],
        ]
    }

    #[test]
    fn test_fit_keeps_requested_components() {
        let x = correlated();
        let (reducer, scores) = DimensionalityReducer::fit(ReductionMethod::Pca, x.view(), 2).unwrap();
        assert_eq!(reducer.k(), 2);
        assert_eq!(scores.dim(), (8, 2));
        assert_eq!(reducer.component_names(), vec!["dim1", "dim2"]);
    }

    #[test]
    fn test_variance_is_ordered_and_bounded() {
        let x = correlated();
        let (model, scores) = PcaModel::fit(x.view(), 3).unwrap();
        let ev = model.explained_variance();
        assert!(ev[0] >= ev[1] && ev[1] >= ev[2]);
        assert_abs_diff_eq!(model.explained_variance_ratio().sum(), 1.0, epsilon = 1e-9);

        // Score variance equals the component's explained variance.
        let var0 = scores.column(0).var(1.0);
        assert_abs_diff_eq!(var0, ev[0], epsilon = 1e-9);
        // Scores are centered.
        let means = scores.mean_axis(Axis(0)).unwrap();
        assert_abs_diff_eq!(means[0], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sign_convention() {
        let (model, _) = PcaModel::fit(correlated().view(), 2).unwrap();
        for column in model.loadings().columns() {
            let pivot = column
                .iter()
                .copied()
                .fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
            assert!(pivot > 0.0);
        }
    }

    #[test]
    fn test_transform_matches_training_scores() {
        let x = correlated();
        let (reducer, scores) = DimensionalityReducer::fit(ReductionMethod::Pca, x.view(), 2).unwrap();
        let again = reducer.transform(x.view()).unwrap();
        for (a, b) in scores.iter().zip(again.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
        assert_eq!(reducer.transform(x.view()).unwrap(), again);
    }

    #[test]
    fn test_k_clipped_to_sample_count() {
        let x = array![[1.0, 2.0, 3.0, 0.5], [2.0, 1.0, 0.0, 1.5], [0.0, 4.0, 1.0, 2.5]];
        let (reducer, scores) = DimensionalityReducer::fit(ReductionMethod::Pca, x.view(), 4).unwrap();
        assert_eq!(reducer.k(), 3);
        assert_eq!(scores.ncols(), 3);
    }

    #[test]
    fn test_invalid_k_rejected() {
        let x = correlated();
        let err = PcaModel::fit(x.view(), 4).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DIMENSION");
        let err = PcaModel::fit(x.view(), 0).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DIMENSION");
    }

    #[test]
    fn test_constant_column_rejected() {
        let x = array![[1.0, 7.0], [2.0, 7.0], [3.0, 7.0]];
        let err = PcaModel::fit(x.view(), 1).unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_FEATURE_DATA");
        assert!(err.to_string().contains("'2'"));
    }

    #[test]
    fn test_transform_rejects_wrong_width() {
        let (reducer, _) =
            DimensionalityReducer::fit(ReductionMethod::Pca, correlated().view(), 2).unwrap();
        let err = reducer.transform(array![[1.0, 2.0]].view()).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DIMENSION");
    }
}
