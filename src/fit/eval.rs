//! Chronological holdout training and evaluation.
//!
//! These are time series: the holdout is always the latest fraction of the
//! rows, never a random shuffle. The model fits on `log1p(target)`;
//! predictions are inverse-transformed with `expm1`, clipped at zero, and
//! scored with MAE in the original case-count unit.

use crate::domain::SeriesFrame;
use crate::error::AppError;
use crate::fit::gbdt::{Gbdt, GbdtParams};

/// Fit + validation result for one city.
#[derive(Debug, Clone)]
pub struct CityFit {
    pub model: Gbdt,
    /// Validation MAE in case counts.
    pub mae: f64,
    pub n_rows: usize,
    pub n_fit: usize,
    pub n_val: usize,
}

/// Index of the first validation row: the earliest `split_ratio` of rows fit.
pub fn holdout_boundary(n: usize, split_ratio: f64) -> Result<usize, AppError> {
    if !(split_ratio.is_finite() && split_ratio > 0.0 && split_ratio < 1.0) {
        return Err(AppError::input(format!(
            "`split_ratio` must be in (0, 1); got {split_ratio}."
        )));
    }
    let cut = (n as f64 * split_ratio) as usize;
    if cut == 0 || cut >= n {
        return Err(AppError::data(format!(
            "Too few rows ({n}) for a chronological holdout at ratio {split_ratio}."
        )));
    }
    Ok(cut)
}

/// Extract a column-major feature matrix (NaN for missing cells).
pub fn design_matrix(frame: &SeriesFrame, columns: &[String]) -> Result<Vec<Vec<f64>>, AppError> {
    columns
        .iter()
        .map(|name| {
            let column = frame.column(name).ok_or_else(|| {
                AppError::input(format!("Feature column `{name}` is missing from the table."))
            })?;
            Ok(column.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
        })
        .collect()
}

/// Extract a dense target vector; a missing target cell is a data error.
pub fn target_vector(frame: &SeriesFrame, target: &str) -> Result<Vec<f64>, AppError> {
    let column = frame.column(target).ok_or_else(|| {
        AppError::input(format!("Target column `{target}` is missing from the table."))
    })?;
    column
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.ok_or_else(|| {
                AppError::data(format!("Missing `{target}` value at row {i} after cleaning."))
            })
        })
        .collect()
}

/// Train on the earliest rows, validate on the rest, report MAE.
///
/// The frame must already be time-sorted (every frame in the pipeline is).
pub fn train_and_validate(
    frame: &SeriesFrame,
    feature_columns: &[String],
    target: &str,
    split_ratio: f64,
    params: &GbdtParams,
) -> Result<CityFit, AppError> {
    let n = frame.len();
    let cut = holdout_boundary(n, split_ratio)?;

    let columns = design_matrix(frame, feature_columns)?;
    let y = target_vector(frame, target)?;

    let fit_columns: Vec<Vec<f64>> = columns.iter().map(|c| c[..cut].to_vec()).collect();
    let val_columns: Vec<Vec<f64>> = columns.iter().map(|c| c[cut..].to_vec()).collect();
    let y_fit_log: Vec<f64> = y[..cut].iter().map(|v| v.ln_1p()).collect();

    let model = Gbdt::fit(&fit_columns, &y_fit_log, params)?;

    let predictions = to_case_counts(&model.predict(&val_columns));
    let mae = mean_absolute_error(&y[cut..], &predictions)?;
    if !mae.is_finite() {
        return Err(AppError::model(format!(
            "Validation produced a non-finite MAE ({mae})."
        )));
    }

    Ok(CityFit {
        model,
        mae,
        n_rows: n,
        n_fit: cut,
        n_val: n - cut,
    })
}

/// Predict case counts for every row of a feature table.
pub fn predict_cases(
    model: &Gbdt,
    frame: &SeriesFrame,
    feature_columns: &[String],
) -> Result<Vec<f64>, AppError> {
    let columns = design_matrix(frame, feature_columns)?;
    let cases = to_case_counts(&model.predict(&columns));
    if let Some(i) = cases.iter().position(|v| !v.is_finite()) {
        return Err(AppError::model(format!(
            "Model produced a non-finite prediction at row {i}."
        )));
    }
    Ok(cases)
}

/// Inverse of the log1p transform, clipped so counts are never negative.
fn to_case_counts(log_predictions: &[f64]) -> Vec<f64> {
    log_predictions.iter().map(|v| v.exp_m1().max(0.0)).collect()
}

pub fn mean_absolute_error(truth: &[f64], predictions: &[f64]) -> Result<f64, AppError> {
    if truth.len() != predictions.len() || truth.is_empty() {
        return Err(AppError::data(format!(
            "MAE needs matching non-empty slices; got {} and {}.",
            truth.len(),
            predictions.len()
        )));
    }
    let sum: f64 = truth
        .iter()
        .zip(predictions.iter())
        .map(|(t, p)| (t - p).abs())
        .sum();
    Ok(sum / truth.len() as f64)
}
