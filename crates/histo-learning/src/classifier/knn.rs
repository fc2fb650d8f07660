//! k-nearest-neighbors with a cross-validated neighbor count.

use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classifier::cv::{self, CvProfile};
use crate::config::TrainConfig;
use crate::error::{LearningError, Result};
use crate::preprocess::Standardizer;

/// Smallest neighbor count on the default grid.
const FIRST_CANDIDATE: usize = 5;

/// A fitted k-NN model.
///
/// Training points are stored already standardized; queries go through the
/// same [`Standardizer`] before distances are taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawKnnModel")]
pub struct KnnModel {
    scaler: Standardizer,
    points: Array2<f64>,
    codes: Vec<usize>,
    n_levels: usize,
    k_neighbors: usize,
    profile: CvProfile,
}

#[derive(Deserialize)]
struct RawKnnModel {
    scaler: Standardizer,
    points: Array2<f64>,
    codes: Vec<usize>,
    n_levels: usize,
    k_neighbors: usize,
    profile: CvProfile,
}

impl TryFrom<RawKnnModel> for KnnModel {
    type Error = LearningError;

    fn try_from(raw: RawKnnModel) -> Result<Self> {
        let (n, d) = raw.points.dim();
        if d != raw.scaler.n_features() || raw.codes.len() != n {
            return Err(LearningError::InvalidArtifact(format!(
                "k-NN stores {} x {} points with {} code(s) and a scaler over {} column(s)",
                n,
                d,
                raw.codes.len(),
                raw.scaler.n_features()
            )));
        }
        if raw.n_levels < 2 || raw.codes.iter().any(|&c| c >= raw.n_levels) {
            return Err(LearningError::InvalidArtifact(format!(
                "k-NN class codes must index {} level(s), at least 2",
                raw.n_levels
            )));
        }
        if raw.k_neighbors == 0 || raw.k_neighbors > n {
            return Err(LearningError::InvalidArtifact(format!(
                "k-NN uses {} neighbor(s) for {} training point(s)",
                raw.k_neighbors, n
            )));
        }
        Ok(Self {
            scaler: raw.scaler,
            points: raw.points,
            codes: raw.codes,
            n_levels: raw.n_levels,
            k_neighbors: raw.k_neighbors,
            profile: raw.profile,
        })
    }
}

/// Odd neighbor counts `5, 7, 9, ...`, `tune_length` of them.
pub fn neighbor_grid(tune_length: usize) -> Vec<usize> {
    (0..tune_length).map(|i| FIRST_CANDIDATE + 2 * i).collect()
}

impl KnnModel {
    /// Select `k_neighbors` by stratified cross-validation, then refit on all of `x`.
    pub fn fit(
        x: ArrayView2<'_, f64>,
        codes: &[usize],
        n_levels: usize,
        config: &TrainConfig,
    ) -> Result<Self> {
        let n = x.nrows();
        let folds = cv::effective_folds(config.cv_folds, n);
        let assignment = cv::stratified_folds(codes, n_levels, folds, config.random_seed);
        let min_train = cv::training_fold_sizes(&assignment, folds)
            .into_iter()
            .min()
            .unwrap_or(0);
        if min_train == 0 {
            return Err(LearningError::TrainingFailed(format!(
                "cannot cross-validate k-NN on {} sample(s)",
                n
            )));
        }

        let mut candidates: Vec<usize> = neighbor_grid(config.tune_length)
            .into_iter()
            .filter(|&k| k <= min_train)
            .collect();
        if candidates.is_empty() {
            debug!(
                "No grid candidate fits a training fold of {} sample(s); using k = {}",
                min_train, min_train
            );
            candidates.push(min_train);
        }

        let accuracies = cv::cross_validate(
            x,
            codes,
            &assignment,
            folds,
            candidates.len(),
            |train_x, train_y, test_x| {
                Ok(test_x
                    .rows()
                    .into_iter()
                    .map(|query| {
                        let order = neighbor_order(train_x.view(), query);
                        candidates
                            .iter()
                            .map(|&k| vote(&order, train_y, n_levels, k))
                            .collect::<Vec<_>>()
                    })
                    .fold(vec![Vec::new(); candidates.len()], |mut acc, per_k| {
                        for (slot, label) in acc.iter_mut().zip(per_k) {
                            slot.push(label);
                        }
                        acc
                    }))
            },
        )?;

        for (k, acc) in candidates.iter().zip(&accuracies) {
            debug!("k-NN k = {}: mean CV accuracy {:.4}", k, acc);
        }

        let best = cv::select_best(&accuracies);
        let k_neighbors = candidates[best];
        info!(
            "Selected k = {} neighbors ({}-fold CV accuracy {:.4})",
            k_neighbors, folds, accuracies[best]
        );

        let scaler = Standardizer::fit(x).tolerate_constant_columns();
        let points = scaler.transform(x);

        Ok(Self {
            scaler,
            points,
            codes: codes.to_vec(),
            n_levels,
            k_neighbors,
            profile: CvProfile {
                parameter: "k_neighbors".to_string(),
                candidates: candidates.iter().map(|&k| k as f64).collect(),
                accuracies,
                folds,
                best,
            },
        })
    }

    /// Majority vote among the `k_neighbors` nearest training points.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<usize> {
        let queries = self.scaler.transform(x);
        queries
            .rows()
            .into_iter()
            .map(|query| {
                let order = neighbor_order(self.points.view(), query);
                vote(&order, &self.codes, self.n_levels, self.k_neighbors)
            })
            .collect()
    }

    pub fn k_neighbors(&self) -> usize {
        self.k_neighbors
    }

    pub fn n_features(&self) -> usize {
        self.points.ncols()
    }

    /// Number of class levels the codes index.
    pub fn n_levels(&self) -> usize {
        self.n_levels
    }

    pub fn profile(&self) -> &CvProfile {
        &self.profile
    }
}

/// Training indices sorted by (distance to `query`, index).
fn neighbor_order(points: ArrayView2<'_, f64>, query: ArrayView1<'_, f64>) -> Vec<usize> {
    let mut distances: Vec<(f64, usize)> = points
        .rows()
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            let d: f64 = row
                .iter()
                .zip(query.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            (d, i)
        })
        .collect();
    distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    distances.into_iter().map(|(_, i)| i).collect()
}

/// Most frequent class among the first `k` entries of `order`.
///
/// Ties go to the lowest class index.
fn vote(order: &[usize], codes: &[usize], n_levels: usize, k: usize) -> usize {
    let mut counts = vec![0usize; n_levels];
    for &i in order.iter().take(k) {
        counts[codes[i]] += 1;
    }
    let mut best = 0;
    for (level, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = level;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use pretty_assertions::assert_eq;

    fn two_clusters() -> (Array2<f64>, Vec<usize>) {
        let mut rows = Vec::new();
        let mut codes = Vec::new();
        for i in 0..12 {
            let offset = (i % 4) as f64 * 0.1;
            rows.extend_from_slice(&[offset, 0.2 - offset]);
            codes.push(0);
            rows.extend_from_slice(&[5.0 + offset, 5.0 - offset]);
            codes.push(1);
        }
        (Array2::from_shape_vec((24, 2), rows).unwrap(), codes)
    }

    #[test]
    fn test_grid() {
        assert_eq!(neighbor_grid(3), vec![5, 7, 9]);
        assert_eq!(neighbor_grid(10).last(), Some(&23));
    }

    #[test]
    fn test_vote_tie_goes_to_lowest_level() {
        let codes = vec![1, 0, 1, 0];
        assert_eq!(vote(&[0, 1, 2, 3], &codes, 2, 4), 0);
        assert_eq!(vote(&[0, 1, 2, 3], &codes, 2, 3), 1);
    }

    #[test]
    fn test_neighbor_order_is_stable() {
        let points = array![[1.0], [-1.0], [0.5]];
        let order = neighbor_order(points.view(), array![0.0].view());
        assert_eq!(order, vec![2, 0, 1]);
    }

    #[test]
    fn test_fit_and_predict_separated_clusters() {
        let (x, codes) = two_clusters();
        let config = TrainConfig::builder().cv_folds(4).build().unwrap();
        let model = KnnModel::fit(x.view(), &codes, 2, &config).unwrap();

        assert_eq!(model.profile().best_accuracy(), 1.0);
        assert_eq!(model.k_neighbors(), 5);

        let predicted = model.predict(array![[0.05, 0.1], [5.1, 4.9]].view());
        assert_eq!(predicted, vec![0, 1]);
    }

    #[test]
    fn test_oversized_candidates_dropped() {
        let (x, codes) = two_clusters();
        // 24 samples, 4 folds: training folds hold 18 samples.
        let config = TrainConfig::builder().cv_folds(4).build().unwrap();
        let model = KnnModel::fit(x.view(), &codes, 2, &config).unwrap();
        assert_eq!(model.profile().candidates.last(), Some(&17.0));
    }

    #[test]
    fn test_tiny_data_falls_back_to_fold_size() {
        let x = array![[0.0], [0.1], [3.0], [3.1]];
        let codes = vec![0, 0, 1, 1];
        let config = TrainConfig::builder().cv_folds(2).build().unwrap();
        let model = KnnModel::fit(x.view(), &codes, 2, &config).unwrap();
        assert_eq!(model.k_neighbors(), 2);
    }

    #[test]
    fn test_deserialize_rejects_out_of_range_codes() {
        let (x, codes) = two_clusters();
        let config = TrainConfig::builder().cv_folds(4).build().unwrap();
        let model = KnnModel::fit(x.view(), &codes, 2, &config).unwrap();
        let mut value = serde_json::to_value(&model).unwrap();

        value["codes"][3] = serde_json::json!(7);
        let err = serde_json::from_value::<KnnModel>(value.clone()).unwrap_err();
        assert!(err.to_string().contains("must index 2 level(s)"));

        value["codes"][3] = serde_json::json!(1);
        value["k_neighbors"] = serde_json::json!(0);
        assert!(serde_json::from_value::<KnnModel>(value).is_err());
    }
}
