//! Read/write model and run-artifact JSON files.
//!
//! Model JSON is the "portable" representation of a trained city model:
//! - fitted trees + boosting metadata
//! - the exact feature column list the model was trained on
//! - run metadata (city, target, params, validation MAE)
//!
//! Prediction reloads these instead of retraining, so the schema is the
//! contract between `dengue train` and `dengue predict`.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::City;
use crate::error::AppError;
use crate::fit::{Gbdt, GbdtParams};

/// A saved per-city model (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    pub tool: String,
    pub city: City,
    pub target: String,
    pub feature_columns: Vec<String>,
    pub params: GbdtParams,
    pub model: Gbdt,
    pub validation_mae: f64,
}

/// Write a model JSON file.
pub fn write_model_json(path: &Path, model: &ModelFile) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::input(format!(
            "Failed to create model JSON '{}': {e}",
            path.display()
        ))
    })?;
    serde_json::to_writer_pretty(file, model)
        .map_err(|e| AppError::input(format!("Failed to write model JSON: {e}")))
}

/// Read a model JSON file.
pub fn read_model_json(path: &Path) -> Result<ModelFile, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::input(format!(
            "Failed to open model JSON '{}': {e}",
            path.display()
        ))
    })?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::input(format!("Invalid model JSON '{}': {e}", path.display())))
}

/// Write a plain JSON list of feature column names.
pub fn write_feature_columns_json(path: &Path, columns: &[String]) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::input(format!(
            "Failed to create feature-columns JSON '{}': {e}",
            path.display()
        ))
    })?;
    serde_json::to_writer_pretty(file, columns)
        .map_err(|e| AppError::input(format!("Failed to write feature-columns JSON: {e}")))
}

/// Read a plain JSON list of feature column names.
pub fn read_feature_columns_json(path: &Path) -> Result<Vec<String>, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::input(format!(
            "Failed to open feature-columns JSON '{}': {e}",
            path.display()
        ))
    })?;
    serde_json::from_reader(file).map_err(|e| {
        AppError::input(format!(
            "Invalid feature-columns JSON '{}': {e}",
            path.display()
        ))
    })
}

/// Write the run metrics summary (e.g. `{"mae_sj": ..., "mae_iq": ...}`).
pub fn write_metrics_json(path: &Path, metrics: &BTreeMap<String, f64>) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::input(format!(
            "Failed to create metrics JSON '{}': {e}",
            path.display()
        ))
    })?;
    serde_json::to_writer_pretty(file, metrics)
        .map_err(|e| AppError::input(format!("Failed to write metrics JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_file_round_trips() {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "dengue-model-{}-{:?}.json",
            std::process::id(),
            std::thread::current().id()
        ));

        let columns = vec!["week_sin".to_string(), "week_cos".to_string()];
        let x = vec![vec![0.0, 1.0, 2.0, 3.0], vec![3.0, 2.0, 1.0, 0.0]];
        let y = vec![1.0, 2.0, 3.0, 4.0];
        let params = GbdtParams {
            n_estimators: 5,
            max_depth: 2,
            subsample: 1.0,
            colsample_bytree: 1.0,
            ..GbdtParams::default()
        };
        let model = Gbdt::fit(&x, &y, &params).unwrap();
        let before = model.predict(&x);

        let file = ModelFile {
            tool: "dengue".to_string(),
            city: City::SanJuan,
            target: "total_cases".to_string(),
            feature_columns: columns.clone(),
            params,
            model,
            validation_mae: 3.25,
        };
        write_model_json(&path, &file).unwrap();
        let loaded = read_model_json(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.city, City::SanJuan);
        assert_eq!(loaded.feature_columns, columns);
        let after = loaded.model.predict(&x);
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
