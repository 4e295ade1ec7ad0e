//! Squared-error gradient boosting.
//!
//! Deterministic given the seed: row subsampling and per-tree column
//! subsampling draw from a seeded `StdRng`, split search is exact, and ties
//! are broken by index. Two runs with the same data and params produce
//! byte-identical models.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::fit::tree::{GrowContext, RegressionTree};

/// Boosting hyperparameters.
///
/// Defaults are the shared baseline; the per-city presets only adjust tree
/// count and depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbdtParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Fraction of rows drawn (without replacement) per tree.
    pub subsample: f64,
    /// Fraction of feature columns drawn per tree.
    pub colsample_bytree: f64,
    /// L2 regularization on leaf values.
    pub reg_lambda: f64,
    /// Minimum row count per child node.
    pub min_child_weight: f64,
    pub seed: u64,
}

impl Default for GbdtParams {
    fn default() -> Self {
        Self {
            n_estimators: 2000,
            learning_rate: 0.03,
            max_depth: 4,
            subsample: 0.8,
            colsample_bytree: 0.8,
            reg_lambda: 1.0,
            min_child_weight: 1.0,
            seed: 42,
        }
    }
}

impl GbdtParams {
    /// Baseline preset for San Juan.
    pub fn san_juan() -> Self {
        Self {
            n_estimators: 1500,
            max_depth: 4,
            ..Self::default()
        }
    }

    /// Baseline preset for Iquitos (smaller series, shallower trees).
    pub fn iquitos() -> Self {
        Self {
            n_estimators: 1200,
            max_depth: 3,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.n_estimators == 0 {
            return Err(AppError::input("`n_estimators` must be at least 1."));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(AppError::input("`learning_rate` must be positive."));
        }
        for (name, value) in [
            ("subsample", self.subsample),
            ("colsample_bytree", self.colsample_bytree),
        ] {
            if !(value.is_finite() && value > 0.0 && value <= 1.0) {
                return Err(AppError::input(format!("`{name}` must be in (0, 1].")));
            }
        }
        if !(self.reg_lambda.is_finite() && self.reg_lambda >= 0.0) {
            return Err(AppError::input("`reg_lambda` must be non-negative."));
        }
        Ok(())
    }
}

/// A fitted gradient-boosted model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gbdt {
    pub base_score: f64,
    pub learning_rate: f64,
    pub trees: Vec<RegressionTree>,
}

impl Gbdt {
    /// Fit on a column-major matrix (`columns[feature][row]`, NaN = missing)
    /// and a dense target vector.
    pub fn fit(columns: &[Vec<f64>], y: &[f64], params: &GbdtParams) -> Result<Gbdt, AppError> {
        params.validate()?;

        let n = y.len();
        if n == 0 {
            return Err(AppError::data("No rows to fit."));
        }
        if columns.is_empty() {
            return Err(AppError::data("No feature columns to fit."));
        }
        for (idx, column) in columns.iter().enumerate() {
            if column.len() != n {
                return Err(AppError::data(format!(
                    "Feature column {idx} has {} rows; target has {n}.",
                    column.len()
                )));
            }
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(AppError::data("Non-finite target value."));
        }

        let base_score = y.iter().sum::<f64>() / n as f64;
        let mut predictions = vec![base_score; n];
        let mut residuals = vec![0.0; n];
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut rng = StdRng::seed_from_u64(params.seed);

        for _ in 0..params.n_estimators {
            let mut converged = true;
            for i in 0..n {
                residuals[i] = y[i] - predictions[i];
                if residuals[i].abs() > 1e-12 {
                    converged = false;
                }
            }
            if converged {
                break;
            }

            let rows = sample_fraction(&mut rng, n, params.subsample);
            let features = sample_fraction(&mut rng, columns.len(), params.colsample_bytree);

            let ctx = GrowContext {
                columns,
                targets: &residuals,
                max_depth: params.max_depth,
                reg_lambda: params.reg_lambda,
                min_child_weight: params.min_child_weight,
            };
            let tree = RegressionTree::grow(&ctx, &rows, &features);

            for (i, prediction) in predictions.iter_mut().enumerate() {
                *prediction += params.learning_rate * tree.predict_row(columns, i);
            }
            trees.push(tree);
        }

        Ok(Gbdt {
            base_score,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    /// Predict every row of a column-major matrix.
    ///
    /// The matrix must carry the same feature columns, in the same order, as
    /// the one the model was fit on.
    pub fn predict(&self, columns: &[Vec<f64>]) -> Vec<f64> {
        let n = columns.first().map_or(0, Vec::len);
        let mut out = vec![self.base_score; n];
        for tree in &self.trees {
            for (i, value) in out.iter_mut().enumerate() {
                *value += self.learning_rate * tree.predict_row(columns, i);
            }
        }
        out
    }
}

/// Draw `round(fraction * n)` distinct indices (at least one), sorted.
fn sample_fraction(rng: &mut StdRng, n: usize, fraction: f64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    if fraction >= 1.0 {
        return indices;
    }
    let k = ((n as f64 * fraction).round() as usize).clamp(1, n);
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}
