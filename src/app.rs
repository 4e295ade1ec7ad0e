//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - builds run configurations from them
//! - runs the train/predict pipelines
//! - prints reports and writes the run summary

use clap::Parser;

use crate::cli::{Command, PredictArgs, TrainArgs};
use crate::domain::{PredictConfig, TrainConfig};
use crate::error::AppError;
use crate::features::FeatureConfig;
use crate::fit::GbdtParams;
use crate::track::JsonRecorder;

pub mod pipeline;

/// Entry point for the `dengue` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Train(args) => handle_train(args),
        Command::Predict(args) => handle_predict(args),
    }
}

fn handle_train(args: TrainArgs) -> Result<(), AppError> {
    let config = train_config_from_args(&args);
    let mut recorder = JsonRecorder::new(&config.run_name);

    let runs = pipeline::run_train(&config, &mut recorder)?;

    println!("{}", crate::report::format_train_summary(&runs, &config));

    let summary_path = config.artifacts_dir.join("run.json");
    recorder.write_json(&summary_path)?;
    println!("Run summary written: {}", summary_path.display());

    Ok(())
}

fn handle_predict(args: PredictArgs) -> Result<(), AppError> {
    let config = predict_config_from_args(&args);
    let output = pipeline::run_predict(&config)?;
    println!("{}", crate::report::format_predict_summary(&output));
    Ok(())
}

pub fn train_config_from_args(args: &TrainArgs) -> TrainConfig {
    let features = FeatureConfig {
        roll_windows: args.roll_windows.clone(),
        lags: args.lags.clone(),
        include_case_lags: args.case_lags,
        ..FeatureConfig::default()
    };
    TrainConfig {
        data_dir: args.data_dir.clone(),
        artifacts_dir: args.artifacts_dir.clone(),
        split_ratio: args.split_ratio,
        features,
        params_sj: GbdtParams {
            seed: args.seed,
            ..GbdtParams::san_juan()
        },
        params_iq: GbdtParams {
            seed: args.seed,
            ..GbdtParams::iquitos()
        },
        run_name: args.run_name.clone(),
    }
}

pub fn predict_config_from_args(args: &PredictArgs) -> PredictConfig {
    PredictConfig {
        data_dir: args.data_dir.clone(),
        artifacts_dir: args.artifacts_dir.clone(),
        out_path: args.out.clone(),
        features: FeatureConfig {
            include_case_lags: args.case_lags,
            ..FeatureConfig::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn train_config_carries_city_presets_and_seed() {
        let args = TrainArgs {
            data_dir: Path::new("data").to_path_buf(),
            artifacts_dir: Path::new("artifacts").to_path_buf(),
            split_ratio: 0.8,
            roll_windows: vec![3, 5],
            lags: vec![1, 2, 3],
            case_lags: false,
            seed: 7,
            run_name: "test".to_string(),
        };
        let config = train_config_from_args(&args);
        assert_eq!(config.params_sj.n_estimators, 1500);
        assert_eq!(config.params_iq.n_estimators, 1200);
        assert_eq!(config.params_iq.max_depth, 3);
        assert_eq!(config.params_sj.seed, 7);
        assert_eq!(config.params_iq.seed, 7);
    }
}
