//! Raw data loading and label merging.
//!
//! The loader knows the four-file layout of the dataset and nothing else:
//! tables come back unmodified, and the label merge is a plain left join on
//! the (city, year, weekofyear) key.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::TARGET_COLUMN;
use crate::error::AppError;
use crate::io::ingest::{RawTable, read_observation_table};

pub const TRAIN_FEATURES_FILE: &str = "dengue_features_train.csv";
pub const TRAIN_LABELS_FILE: &str = "dengue_labels_train.csv";
pub const TEST_FEATURES_FILE: &str = "dengue_features_test.csv";
pub const SUBMISSION_FORMAT_FILE: &str = "submission_format.csv";

/// The three input tables, unmodified.
#[derive(Debug, Clone)]
pub struct RawData {
    pub train_features: RawTable,
    pub train_labels: RawTable,
    pub test_features: RawTable,
}

/// Load train features, train labels, and test features from `data_dir`.
pub fn load_raw_data(data_dir: &Path) -> Result<RawData, AppError> {
    Ok(RawData {
        train_features: read_observation_table(&data_dir.join(TRAIN_FEATURES_FILE))?,
        train_labels: read_observation_table(&data_dir.join(TRAIN_LABELS_FILE))?,
        test_features: read_observation_table(&data_dir.join(TEST_FEATURES_FILE))?,
    })
}

pub fn submission_format_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SUBMISSION_FORMAT_FILE)
}

/// Left-join labels onto features by (city, year, weekofyear).
///
/// Feature rows with no matching label keep a missing target; label rows
/// with no matching feature row are dropped, as in a left join.
pub fn merge_labels(features: RawTable, labels: &RawTable) -> Result<RawTable, AppError> {
    let target_idx = labels.value_index(TARGET_COLUMN).ok_or_else(|| {
        AppError::input(format!(
            "Label table is missing required column: `{TARGET_COLUMN}`"
        ))
    })?;
    if features.value_index(TARGET_COLUMN).is_some() {
        return Err(AppError::input(format!(
            "Feature table already has a `{TARGET_COLUMN}` column; refusing to merge labels."
        )));
    }

    let mut label_map: HashMap<(String, i32, u32), Option<f64>> = HashMap::new();
    for row in &labels.rows {
        label_map.insert(
            (row.city.clone(), row.key.year, row.key.week),
            row.values[target_idx],
        );
    }

    let mut merged = features;
    merged.value_names.push(TARGET_COLUMN.to_string());
    for row in &mut merged.rows {
        let target = label_map
            .get(&(row.city.clone(), row.key.year, row.key.week))
            .copied()
            .flatten();
        row.values.push(target);
    }

    Ok(merged)
}
