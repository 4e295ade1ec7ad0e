//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during feature construction and fitting
//! - exported to JSON artifacts
//! - reloaded later for prediction

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::features::FeatureConfig;
use crate::fit::GbdtParams;

/// Name of the label column in the raw data and the submission format.
pub const TARGET_COLUMN: &str = "total_cases";

/// Name of the derived log-target column.
///
/// The fit works on `log1p(total_cases)`; if a caller materializes that as a
/// column it must never leak into the model-eligible feature set.
pub const LOG_TARGET_COLUMN: &str = "log_cases";

/// The two cities in the dataset.
///
/// Each city's series is processed independently end-to-end; no feature ever
/// crosses the city boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum City {
    #[serde(rename = "sj")]
    SanJuan,
    #[serde(rename = "iq")]
    Iquitos,
}

impl City {
    pub const ALL: [City; 2] = [City::SanJuan, City::Iquitos];

    /// City code as it appears in the `city` column.
    pub fn code(self) -> &'static str {
        match self {
            City::SanJuan => "sj",
            City::Iquitos => "iq",
        }
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            City::SanJuan => "San Juan",
            City::Iquitos => "Iquitos",
        }
    }

    pub fn parse(code: &str) -> Option<City> {
        match code.trim().to_ascii_lowercase().as_str() {
            "sj" => Some(City::SanJuan),
            "iq" => Some(City::Iquitos),
            _ => None,
        }
    }
}

/// Which side of the train/test boundary a combined-frame row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Train,
    Test,
}

/// Identifier tuple for one weekly observation.
///
/// `(year, week)` defines temporal order within a city; `week_start` is
/// carried for exports but takes no part in ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationKey {
    pub year: i32,
    pub week: u32,
    pub week_start: Option<NaiveDate>,
}

impl ObservationKey {
    pub fn new(year: i32, week: u32) -> Self {
        Self {
            year,
            week,
            week_start: None,
        }
    }

    /// Sort key: strictly increasing along a city's series.
    pub fn time_key(&self) -> (i32, u32) {
        (self.year, self.week)
    }
}

/// Configuration for a `dengue train` run.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub data_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    /// Fraction of earliest rows used for fitting; the rest validate.
    pub split_ratio: f64,
    pub features: FeatureConfig,
    pub params_sj: GbdtParams,
    pub params_iq: GbdtParams,
    pub run_name: String,
}

impl TrainConfig {
    pub fn params_for(&self, city: City) -> &GbdtParams {
        match city {
            City::SanJuan => &self.params_sj,
            City::Iquitos => &self.params_iq,
        }
    }
}

/// Configuration for a `dengue predict` run.
#[derive(Debug, Clone)]
pub struct PredictConfig {
    pub data_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub out_path: PathBuf,
    pub features: FeatureConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_codes_round_trip() {
        for city in City::ALL {
            assert_eq!(City::parse(city.code()), Some(city));
        }
        assert_eq!(City::parse(" SJ "), Some(City::SanJuan));
        assert_eq!(City::parse("nyc"), None);
    }

    #[test]
    fn observation_keys_order_by_year_then_week() {
        let a = ObservationKey::new(2001, 52);
        let b = ObservationKey::new(2002, 1);
        assert!(a.time_key() < b.time_key());
    }
}
