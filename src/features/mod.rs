//! Leakage-safe feature construction.
//!
//! - the combined-frame feature engine (`engine`)
//! - model-eligible column selection (`select`)

pub mod engine;
pub mod select;

pub use engine::*;
pub use select::*;

use crate::domain::TARGET_COLUMN;

/// Knobs for the feature engine.
///
/// Defaults reproduce the baseline configuration: rolling means over windows
/// 3 and 5 for the common meteorological columns, lags 1-3 for a smaller
/// subset, and no target lags.
#[derive(Debug, Clone)]
pub struct FeatureConfig {
    pub target: String,
    /// Rolling-mean window sizes.
    pub roll_windows: Vec<usize>,
    /// Rolling source columns; `None` means the default candidate list,
    /// filtered to columns actually present.
    pub roll_columns: Option<Vec<String>>,
    /// Lag distances.
    pub lags: Vec<usize>,
    /// Lag source columns; `None` means the default candidate list.
    pub lag_columns: Option<Vec<String>>,
    /// Also lag the target column (`cases_lag_*`).
    ///
    /// Test rows have no true target, so their lagged-target columns stay
    /// missing; the predictor has to handle that. The engine never fills
    /// them.
    pub include_case_lags: bool,
    pub case_lags: Vec<usize>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            target: TARGET_COLUMN.to_string(),
            roll_windows: vec![3, 5],
            roll_columns: None,
            lags: vec![1, 2, 3],
            lag_columns: None,
            include_case_lags: false,
            case_lags: vec![1, 2, 3],
        }
    }
}
