//! Stratified k-fold cross-validation for hyperparameter selection.

use ndarray::{Array2, ArrayView2, Axis};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LearningError, Result};
use crate::preprocess::Standardizer;

/// Mean validation accuracy per hyperparameter candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCvProfile")]
pub struct CvProfile {
    /// Name of the tuned hyperparameter, e.g. `k_neighbors`.
    pub parameter: String,
    pub candidates: Vec<f64>,
    pub accuracies: Vec<f64>,
    pub folds: usize,
    /// Index into `candidates` of the selected value.
    pub best: usize,
}

#[derive(Deserialize)]
struct RawCvProfile {
    parameter: String,
    candidates: Vec<f64>,
    accuracies: Vec<f64>,
    folds: usize,
    best: usize,
}

impl TryFrom<RawCvProfile> for CvProfile {
    type Error = LearningError;

    fn try_from(raw: RawCvProfile) -> Result<Self> {
        if raw.accuracies.len() != raw.candidates.len() || raw.best >= raw.candidates.len() {
            return Err(LearningError::InvalidArtifact(format!(
                "CV profile for '{}' selects candidate {} of {} with {} accuracy value(s)",
                raw.parameter,
                raw.best,
                raw.candidates.len(),
                raw.accuracies.len()
            )));
        }
        Ok(Self {
            parameter: raw.parameter,
            candidates: raw.candidates,
            accuracies: raw.accuracies,
            folds: raw.folds,
            best: raw.best,
        })
    }
}

impl CvProfile {
    pub fn best_candidate(&self) -> f64 {
        self.candidates[self.best]
    }

    pub fn best_accuracy(&self) -> f64 {
        self.accuracies[self.best]
    }
}

/// Assign each sample to one of `n_folds` folds, stratified by class.
///
/// Members of each class are shuffled and dealt round-robin, continuing the
/// deal across classes so fold sizes differ by at most one. With
/// `n_folds <= codes.len()` every fold is non-empty.
pub fn stratified_folds(codes: &[usize], n_levels: usize, n_folds: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut assignment = vec![0; codes.len()];
    let mut next = 0;

    for level in 0..n_levels {
        let mut members: Vec<usize> = codes
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c == level)
            .map(|(i, _)| i)
            .collect();
        members.shuffle(&mut rng);

        for i in members {
            assignment[i] = next % n_folds;
            next += 1;
        }
    }

    assignment
}

/// Training-side sizes of each fold.
pub fn training_fold_sizes(assignment: &[usize], n_folds: usize) -> Vec<usize> {
    let mut held_out = vec![0; n_folds];
    for &f in assignment {
        held_out[f] += 1;
    }
    held_out.iter().map(|h| assignment.len() - h).collect()
}

/// Evaluate candidates fold by fold.
///
/// For every fold the training part is standardized with its own statistics
/// and the held-out part with the same statistics. `predict` receives
/// `(train_x, train_y, held_out_x)` and returns one prediction vector per
/// candidate. The result is the mean held-out accuracy per candidate.
pub fn cross_validate<F>(
    x: ArrayView2<'_, f64>,
    codes: &[usize],
    assignment: &[usize],
    n_folds: usize,
    n_candidates: usize,
    mut predict: F,
) -> Result<Vec<f64>>
where
    F: FnMut(&Array2<f64>, &[usize], &Array2<f64>) -> Result<Vec<Vec<usize>>>,
{
    let mut totals = vec![0.0; n_candidates];
    let mut used_folds = 0;

    for fold in 0..n_folds {
        let (train_idx, test_idx): (Vec<usize>, Vec<usize>) =
            (0..codes.len()).partition(|&i| assignment[i] != fold);
        if train_idx.is_empty() || test_idx.is_empty() {
            continue;
        }

        let train_raw = x.select(Axis(0), &train_idx);
        let scaler = Standardizer::fit(train_raw.view()).tolerate_constant_columns();
        let train_x = scaler.transform(train_raw.view());
        let test_x = scaler.transform(x.select(Axis(0), &test_idx).view());
        let train_y: Vec<usize> = train_idx.iter().map(|&i| codes[i]).collect();

        let predictions = predict(&train_x, &train_y, &test_x)?;
        if predictions.len() != n_candidates {
            return Err(LearningError::TrainingFailed(format!(
                "fold {} produced {} prediction set(s) for {} candidate(s)",
                fold,
                predictions.len(),
                n_candidates
            )));
        }

        for (total, predicted) in totals.iter_mut().zip(&predictions) {
            let correct = predicted
                .iter()
                .zip(&test_idx)
                .filter(|&(&p, &i)| p == codes[i])
                .count();
            *total += correct as f64 / test_idx.len() as f64;
        }
        used_folds += 1;
    }

    if used_folds == 0 {
        return Err(LearningError::TrainingFailed(
            "cross-validation produced no usable folds".to_string(),
        ));
    }

    Ok(totals.into_iter().map(|t| t / used_folds as f64).collect())
}

/// Index of the highest accuracy; the earliest candidate wins ties.
pub fn select_best(accuracies: &[f64]) -> usize {
    let mut best = 0;
    for (i, &acc) in accuracies.iter().enumerate().skip(1) {
        if acc > accuracies[best] {
            best = i;
        }
    }
    best
}

/// Number of folds actually used: `requested` capped at the sample count.
pub fn effective_folds(requested: usize, n_samples: usize) -> usize {
    let folds = requested.min(n_samples);
    if folds < requested {
        debug!(
            "Capping cross-validation folds from {} to {} (sample count)",
            requested, folds
        );
    }
    folds
}
