//! Shared pipeline logic used by both `train` and `predict`.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load -> merge labels -> per-city split/clean -> feature engine -> fit or
//! predict. Prediction must rebuild features through exactly the same path
//! as training, or the stored feature-column lists stop lining up.

use std::collections::HashMap;
use std::path::Path;

use rayon::prelude::*;

use crate::data::{clean, loader};
use crate::domain::{City, PredictConfig, SeriesFrame, TrainConfig};
use crate::error::AppError;
use crate::features::{self, FeatureConfig};
use crate::fit::{self, CityFit};
use crate::io::export::SubmissionSummary;
use crate::io::model_file::{self, ModelFile};
use crate::track::RunRecorder;

/// One city's fully engineered train/test tables.
#[derive(Debug, Clone)]
pub struct CityDataset {
    pub city: City,
    pub train: SeriesFrame,
    pub test: SeriesFrame,
    pub feature_columns: Vec<String>,
}

/// One city's training result.
#[derive(Debug, Clone)]
pub struct CityRun {
    pub city: City,
    pub fit: CityFit,
    pub feature_columns: Vec<String>,
}

/// Everything `predict` produced, for reporting.
#[derive(Debug, Clone)]
pub struct PredictOutput {
    pub submission: SubmissionSummary,
    pub out_path: std::path::PathBuf,
}

/// Load the raw files and build per-city feature tables.
///
/// The two cities are independent end-to-end, so they are processed as a
/// parallel map; nothing orders one before the other.
pub fn prepare_city_datasets(
    data_dir: &Path,
    config: &FeatureConfig,
) -> Result<Vec<CityDataset>, AppError> {
    let raw = loader::load_raw_data(data_dir)?;
    let merged = loader::merge_labels(raw.train_features, &raw.train_labels)?;
    let test_features = raw.test_features;

    City::ALL
        .par_iter()
        .map(|&city| {
            let train = clean::clean_city_frame(&merged, city)?;
            if train.is_empty() {
                return Err(AppError::data(format!(
                    "No training rows for city '{}'.",
                    city.code()
                )));
            }
            let test = clean::city_frame(&test_features, city)?;

            let (train, test) = features::build_city_features(&train, &test, config)?;
            let feature_columns = features::feature_columns(&train, &config.target, &[]);

            Ok(CityDataset {
                city,
                train,
                test,
                feature_columns,
            })
        })
        .collect()
}

/// Execute a full training run: fit both cities, write artifacts, record
/// params/metrics through the injected recorder.
pub fn run_train(
    config: &TrainConfig,
    recorder: &mut dyn RunRecorder,
) -> Result<Vec<CityRun>, AppError> {
    let datasets = prepare_city_datasets(&config.data_dir, &config.features)?;

    std::fs::create_dir_all(&config.artifacts_dir).map_err(|e| {
        AppError::input(format!(
            "Failed to create artifacts dir '{}': {e}",
            config.artifacts_dir.display()
        ))
    })?;

    let mut runs = Vec::with_capacity(datasets.len());
    let mut metrics = std::collections::BTreeMap::new();

    for dataset in datasets {
        let city = dataset.city;
        let params = config.params_for(city);
        record_params(recorder, city, params);

        let fit = fit::train_and_validate(
            &dataset.train,
            &dataset.feature_columns,
            &config.features.target,
            config.split_ratio,
            params,
        )?;
        recorder.record_metric(&format!("mae_{}", city.code()), fit.mae);
        metrics.insert(format!("mae_{}", city.code()), fit.mae);

        let model_path = config
            .artifacts_dir
            .join(format!("model_{}.json", city.code()));
        model_file::write_model_json(
            &model_path,
            &ModelFile {
                tool: "dengue".to_string(),
                city,
                target: config.features.target.clone(),
                feature_columns: dataset.feature_columns.clone(),
                params: params.clone(),
                model: fit.model.clone(),
                validation_mae: fit.mae,
            },
        )?;
        recorder.record_artifact(&model_path);

        let columns_path = config
            .artifacts_dir
            .join(format!("feat_cols_{}.json", city.code()));
        model_file::write_feature_columns_json(&columns_path, &dataset.feature_columns)?;
        recorder.record_artifact(&columns_path);

        runs.push(CityRun {
            city,
            fit,
            feature_columns: dataset.feature_columns,
        });
    }

    let metrics_path = config.artifacts_dir.join("metrics.json");
    model_file::write_metrics_json(&metrics_path, &metrics)?;
    recorder.record_artifact(&metrics_path);

    Ok(runs)
}

fn record_params(recorder: &mut dyn RunRecorder, city: City, params: &fit::GbdtParams) {
    let prefix = city.code();
    recorder.record_param(
        &format!("{prefix}_n_estimators"),
        &params.n_estimators.to_string(),
    );
    recorder.record_param(
        &format!("{prefix}_learning_rate"),
        &params.learning_rate.to_string(),
    );
    recorder.record_param(&format!("{prefix}_max_depth"), &params.max_depth.to_string());
    recorder.record_param(&format!("{prefix}_subsample"), &params.subsample.to_string());
    recorder.record_param(
        &format!("{prefix}_colsample_bytree"),
        &params.colsample_bytree.to_string(),
    );
}

/// Execute a full prediction run: reload the per-city models, rebuild
/// features, predict, and write the submission.
pub fn run_predict(config: &PredictConfig) -> Result<PredictOutput, AppError> {
    let datasets = prepare_city_datasets(&config.data_dir, &config.features)?;

    let mut predictions: HashMap<City, Vec<f64>> = HashMap::new();
    for dataset in &datasets {
        let model_path = config
            .artifacts_dir
            .join(format!("model_{}.json", dataset.city.code()));
        let model = model_file::read_model_json(&model_path)?;
        if model.city != dataset.city {
            return Err(AppError::input(format!(
                "Model file '{}' is for city '{}'.",
                model_path.display(),
                model.city.code()
            )));
        }

        let columns_path = config
            .artifacts_dir
            .join(format!("feat_cols_{}.json", dataset.city.code()));
        let stored_columns = model_file::read_feature_columns_json(&columns_path)?;
        if stored_columns != model.feature_columns {
            return Err(AppError::input(format!(
                "'{}' does not match the column list inside '{}'; artifacts are from different runs.",
                columns_path.display(),
                model_path.display()
            )));
        }

        // The stored column list is authoritative: it is exactly what the
        // model was trained on.
        let cases = fit::predict_cases(&model.model, &dataset.test, &model.feature_columns)?;
        predictions.insert(dataset.city, cases);
    }

    let format_path = loader::submission_format_path(&config.data_dir);
    let submission =
        crate::io::export::write_submission(&format_path, &config.out_path, &predictions)?;

    Ok(PredictOutput {
        submission,
        out_path: config.out_path.clone(),
    })
}
