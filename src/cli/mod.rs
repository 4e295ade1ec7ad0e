//! Command-line parsing for the dengue forecaster.
//!
//! The goal of this module is to keep **argument parsing** and **command
//! dispatch** separate from the pipeline/modeling code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "dengue", version, about = "Weekly dengue case-count forecaster")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Train one model per city, report validation MAE, write artifacts.
    Train(TrainArgs),
    /// Predict the test weeks with saved models and write a submission file.
    Predict(PredictArgs),
}

/// Options for `dengue train`.
#[derive(Debug, Parser, Clone)]
pub struct TrainArgs {
    /// Directory holding the four dataset CSVs.
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory for model/metrics artifacts.
    #[arg(long, default_value = "artifacts")]
    pub artifacts_dir: PathBuf,

    /// Fraction of earliest rows used for fitting (rest validates).
    #[arg(long, default_value_t = 0.8)]
    pub split_ratio: f64,

    /// Rolling-mean window sizes (comma-separated).
    #[arg(long, value_delimiter = ',', default_values_t = [3, 5])]
    pub roll_windows: Vec<usize>,

    /// Lag distances (comma-separated).
    #[arg(long, value_delimiter = ',', default_values_t = [1, 2, 3])]
    pub lags: Vec<usize>,

    /// Also build lagged-target features (missing on test rows).
    #[arg(long)]
    pub case_lags: bool,

    /// Random seed for row/column subsampling.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Name recorded in the run summary.
    #[arg(long, default_value = "gbdt_log_sj_iq")]
    pub run_name: String,
}

/// Options for `dengue predict`.
#[derive(Debug, Parser, Clone)]
pub struct PredictArgs {
    /// Directory holding the four dataset CSVs.
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory holding training artifacts.
    #[arg(long, default_value = "artifacts")]
    pub artifacts_dir: PathBuf,

    /// Output submission CSV path.
    #[arg(long, default_value = "submission.csv")]
    pub out: PathBuf,

    /// Rebuild lagged-target features (must match how training ran).
    #[arg(long)]
    pub case_lags: bool,
}
