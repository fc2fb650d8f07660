//! Multinomial logistic regression with L2 weight decay.
//!
//! The model is fit by full-batch gradient descent on standardized features,
//! minimizing
//!
//! ```text
//! J(W, b) = (1/n) * [ sum_i CE(softmax(x_i W + b), y_i) + decay * ||W||^2 ]
//! ```
//!
//! Intercepts are not penalized. The decay is chosen by cross-validation over
//! `0` and a log-spaced grid from `1e-1` down to `1e-4`.
//!
//! Descent stops once every gradient entry is below `1e-6` or after
//! `max_iter` steps. A refit that runs out of steps is logged at `warn` and
//! reported by [`LogisticModel::converged`].

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classifier::cv::{self, CvProfile};
use crate::config::TrainConfig;
use crate::error::{LearningError, Result};
use crate::preprocess::Standardizer;

/// Gradient max-norm below which descent stops early.
const GRADIENT_TOLERANCE: f64 = 1e-6;

/// A fitted softmax regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLogisticModel")]
pub struct LogisticModel {
    scaler: Standardizer,
    /// `d x classes`
    coefficients: Array2<f64>,
    intercepts: Array1<f64>,
    decay: f64,
    iterations: usize,
    converged: bool,
    profile: CvProfile,
}

#[derive(Deserialize)]
struct RawLogisticModel {
    scaler: Standardizer,
    coefficients: Array2<f64>,
    intercepts: Array1<f64>,
    decay: f64,
    iterations: usize,
    converged: bool,
    profile: CvProfile,
}

impl TryFrom<RawLogisticModel> for LogisticModel {
    type Error = LearningError;

    fn try_from(raw: RawLogisticModel) -> Result<Self> {
        let (d, classes) = raw.coefficients.dim();
        if d != raw.scaler.n_features() || classes < 2 || raw.intercepts.len() != classes {
            return Err(LearningError::InvalidArtifact(format!(
                "logistic coefficients are {} x {} with {} intercept(s) and a scaler over {} column(s)",
                d,
                classes,
                raw.intercepts.len(),
                raw.scaler.n_features()
            )));
        }
        Ok(Self {
            scaler: raw.scaler,
            coefficients: raw.coefficients,
            intercepts: raw.intercepts,
            decay: raw.decay,
            iterations: raw.iterations,
            converged: raw.converged,
            profile: raw.profile,
        })
    }
}

/// `0` followed by `tune_length - 1` log-spaced values from `1e-1` to `1e-4`.
pub fn decay_grid(tune_length: usize) -> Vec<f64> {
    let mut grid = vec![0.0];
    let m = tune_length.saturating_sub(1);
    for i in 0..m {
        let exponent = if m == 1 {
            -1.0
        } else {
            -1.0 - 3.0 * i as f64 / (m - 1) as f64
        };
        grid.push(10f64.powf(exponent));
    }
    grid
}

/// Descent settings shared by the CV trials and the final refit.
#[derive(Debug, Clone, Copy)]
struct Descent {
    learning_rate: f64,
    max_iter: usize,
}

/// Weights reached by [`descend`] and how the run ended.
#[derive(Debug)]
struct Descended {
    weights: Array2<f64>,
    intercepts: Array1<f64>,
    iterations: usize,
    converged: bool,
    max_gradient: f64,
}

impl LogisticModel {
    /// Select the decay by stratified cross-validation, then refit on all of `x`.
    pub fn fit(
        x: ArrayView2<'_, f64>,
        codes: &[usize],
        n_levels: usize,
        config: &TrainConfig,
    ) -> Result<Self> {
        let n = x.nrows();
        let descent = Descent {
            learning_rate: config.learning_rate,
            max_iter: config.max_iter,
        };

        let folds = cv::effective_folds(config.cv_folds, n);
        if folds < 2 {
            return Err(LearningError::TrainingFailed(format!(
                "cannot cross-validate logistic regression on {} sample(s)",
                n
            )));
        }
        let assignment = cv::stratified_folds(codes, n_levels, folds, config.random_seed);
        let grid = decay_grid(config.tune_length);

        let mut unconverged_trials = 0usize;
        let accuracies = cv::cross_validate(
            x,
            codes,
            &assignment,
            folds,
            grid.len(),
            |train_x, train_y, test_x| {
                Ok(grid
                    .iter()
                    .map(|&decay| {
                        let run = descend(train_x.view(), train_y, n_levels, decay, descent);
                        if !run.converged {
                            unconverged_trials += 1;
                        }
                        argmax_rows(&probabilities(test_x.view(), &run.weights, &run.intercepts))
                    })
                    .collect())
            },
        )?;

        if unconverged_trials > 0 {
            debug!(
                "{} of {} CV fit(s) stopped at max_iter = {} before the gradient tolerance",
                unconverged_trials,
                folds * grid.len(),
                descent.max_iter
            );
        }

        for (decay, acc) in grid.iter().zip(&accuracies) {
            debug!("logistic decay = {:.0e}: mean CV accuracy {:.4}", decay, acc);
        }

        let best = cv::select_best(&accuracies);
        let decay = grid[best];
        info!(
            "Selected weight decay {:.0e} ({}-fold CV accuracy {:.4})",
            decay, folds, accuracies[best]
        );

        let scaler = Standardizer::fit(x).tolerate_constant_columns();
        let z = scaler.transform(x);
        let run = descend(z.view(), codes, n_levels, decay, descent);
        if !run.converged {
            warn!(
                "Logistic refit did not converge: max |gradient| {:.2e} after {} iteration(s) (tolerance {:.0e}); consider a larger max_iter",
                run.max_gradient, run.iterations, GRADIENT_TOLERANCE
            );
        }

        Ok(Self {
            scaler,
            coefficients: run.weights,
            intercepts: run.intercepts,
            decay,
            iterations: run.iterations,
            converged: run.converged,
            profile: CvProfile {
                parameter: "decay".to_string(),
                candidates: grid,
                accuracies,
                folds,
                best,
            },
        })
    }

    /// Posterior class probabilities, one row per sample.
    pub fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let z = self.scaler.transform(x);
        probabilities(z.view(), &self.coefficients, &self.intercepts)
    }

    /// Class with the highest posterior; the lowest index wins ties.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<usize> {
        argmax_rows(&self.predict_proba(x))
    }

    pub fn decay(&self) -> f64 {
        self.decay
    }

    /// Whether the final refit reached the gradient tolerance within `max_iter`.
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Descent steps taken by the final refit.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn coefficients(&self) -> &Array2<f64> {
        &self.coefficients
    }

    pub fn intercepts(&self) -> &Array1<f64> {
        &self.intercepts
    }

    pub fn n_features(&self) -> usize {
        self.coefficients.nrows()
    }

    pub fn profile(&self) -> &CvProfile {
        &self.profile
    }
}

fn descend(
    x: ArrayView2<'_, f64>,
    codes: &[usize],
    n_levels: usize,
    decay: f64,
    descent: Descent,
) -> Descended {
    let (n, d) = x.dim();
    let n_f = n as f64;

    let mut targets = Array2::<f64>::zeros((n, n_levels));
    for (i, &c) in codes.iter().enumerate() {
        targets[[i, c]] = 1.0;
    }

    let mut w = Array2::<f64>::zeros((d, n_levels));
    let mut b = Array1::<f64>::zeros(n_levels);

    let mut max_gradient = f64::INFINITY;
    let mut iterations = 0;
    let mut converged = false;

    while iterations < descent.max_iter {
        let residual = probabilities(x, &w, &b) - &targets;
        let grad_w = (x.t().dot(&residual) + &w * (2.0 * decay)) / n_f;
        let grad_b = residual.sum_axis(Axis(0)) / n_f;

        max_gradient = grad_w
            .iter()
            .chain(grad_b.iter())
            .fold(0.0_f64, |m, g| m.max(g.abs()));
        if max_gradient < GRADIENT_TOLERANCE {
            converged = true;
            break;
        }

        w.scaled_add(-descent.learning_rate, &grad_w);
        b.scaled_add(-descent.learning_rate, &grad_b);
        iterations += 1;
    }

    Descended {
        weights: w,
        intercepts: b,
        iterations,
        converged,
        max_gradient,
    }
}

/// Row-wise softmax of `x W + b`.
fn probabilities(x: ArrayView2<'_, f64>, w: &Array2<f64>, b: &Array1<f64>) -> Array2<f64> {
    let mut logits = x.dot(w) + b;
    for mut row in logits.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    logits
}

fn argmax_rows(probs: &Array2<f64>) -> Vec<usize> {
    probs
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            for (j, &p) in row.iter().enumerate() {
                if p > row[best] {
                    best = j;
                }
            }
            best
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn three_classes() -> (Array2<f64>, Vec<usize>) {
        let centers = [[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]];
        let jitter = [[0.3, -0.2], [-0.1, 0.4], [0.2, 0.1], [-0.4, -0.3], [0.0, 0.2]];
        let mut rows = Vec::new();
        let mut codes = Vec::new();
        for (c, center) in centers.iter().enumerate() {
            for j in jitter {
                rows.extend_from_slice(&[center[0] + j[0], center[1] + j[1]]);
                codes.push(c);
            }
        }
        (Array2::from_shape_vec((15, 2), rows).unwrap(), codes)
    }

    #[test]
    fn test_decay_grid() {
        let grid = decay_grid(10);
        assert_eq!(grid.len(), 10);
        assert_eq!(grid[0], 0.0);
        assert_abs_diff_eq!(grid[1], 1e-1, epsilon = 1e-15);
        assert_abs_diff_eq!(grid[9], 1e-4, epsilon = 1e-15);
        assert_eq!(decay_grid(1), vec![0.0]);
        assert_eq!(decay_grid(2).len(), 2);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, codes) = three_classes();
        let config = TrainConfig::builder().cv_folds(5).tune_length(3).build().unwrap();
        let model = LogisticModel::fit(x.view(), &codes, 3, &config).unwrap();

        let probs = model.predict_proba(x.view());
        for row in probs.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_separable_classes_are_learned() {
        let (x, codes) = three_classes();
        let config = TrainConfig::builder().cv_folds(5).tune_length(3).build().unwrap();
        let model = LogisticModel::fit(x.view(), &codes, 3, &config).unwrap();

        assert_eq!(model.predict(x.view()), codes);
        let predicted = model.predict(array![[4.1, 0.1], [0.1, 3.8]].view());
        assert_eq!(predicted, vec![1, 2]);
        assert_eq!(model.coefficients().dim(), (2, 3));
    }

    #[test]
    fn test_decay_shrinks_weights() {
        let (x, codes) = three_classes();
        let descent = Descent {
            learning_rate: 0.5,
            max_iter: 300,
        };
        let free = descend(x.view(), &codes, 3, 0.0, descent);
        let decayed = descend(x.view(), &codes, 3, 10.0, descent);
        let norm = |w: &Array2<f64>| w.iter().map(|v| v * v).sum::<f64>();
        assert!(norm(&decayed.weights) < norm(&free.weights));
    }

    #[test]
    fn test_descent_reports_convergence() {
        // Symmetric two-point problem; the penalty makes it strongly convex.
        let x = array![[1.0], [-1.0]];
        let codes = vec![0, 1];

        let run = descend(x.view(), &codes, 2, 1.0, Descent { learning_rate: 0.5, max_iter: 500 });
        assert!(run.converged);
        assert!(run.max_gradient < GRADIENT_TOLERANCE);
        assert!(run.iterations < 500);

        let cut_short = descend(x.view(), &codes, 2, 1.0, Descent { learning_rate: 0.5, max_iter: 1 });
        assert!(!cut_short.converged);
        assert_eq!(cut_short.iterations, 1);
        assert!(cut_short.max_gradient >= GRADIENT_TOLERANCE);
    }

    #[test]
    fn test_refit_out_of_steps_is_flagged() {
        let (x, codes) = three_classes();
        let config = TrainConfig::builder()
            .cv_folds(5)
            .tune_length(2)
            .max_iter(1)
            .build()
            .unwrap();
        let model = LogisticModel::fit(x.view(), &codes, 3, &config).unwrap();
        assert!(!model.converged());
        assert_eq!(model.iterations(), 1);
    }

    #[test]
    fn test_deserialize_rejects_mismatched_intercepts() {
        let (x, codes) = three_classes();
        let config = TrainConfig::builder().cv_folds(5).tune_length(2).build().unwrap();
        let model = LogisticModel::fit(x.view(), &codes, 3, &config).unwrap();
        let mut value = serde_json::to_value(&model).unwrap();
        value["intercepts"] = serde_json::json!({"v": 1, "dim": [2], "data": [0.0, 0.0]});
        let err = serde_json::from_value::<LogisticModel>(value).unwrap_err();
        assert!(err.to_string().contains("2 intercept(s)"));
    }
}
