//! Model-eligible column selection.
//!
//! Pure function: given a feature table, return the ordered list of value
//! columns the model may see. Identifier fields (city, year, week, week
//! start date) are structural on `SeriesFrame` and can never appear here;
//! the exclusion set covers the target, the derived log-target, and any
//! caller-specified extras.

use crate::domain::{LOG_TARGET_COLUMN, SeriesFrame};

/// Ordered, deterministic list of model-eligible column names.
pub fn feature_columns(frame: &SeriesFrame, target: &str, extra_exclude: &[String]) -> Vec<String> {
    frame
        .column_names()
        .iter()
        .filter(|name| {
            name.as_str() != target
                && name.as_str() != LOG_TARGET_COLUMN
                && !extra_exclude.iter().any(|e| e == *name)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{City, ObservationKey, TARGET_COLUMN};

    fn frame() -> SeriesFrame {
        let names: Vec<String> = ["ndvi_ne", "week_sin", TARGET_COLUMN, LOG_TARGET_COLUMN]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut frame = SeriesFrame::with_columns(City::Iquitos, &names);
        frame
            .push_row(
                ObservationKey::new(2000, 26),
                vec![Some(0.1), Some(0.5), Some(3.0), Some(1.4)],
            )
            .unwrap();
        frame
    }

    #[test]
    fn excludes_target_and_log_target() {
        let cols = feature_columns(&frame(), TARGET_COLUMN, &[]);
        assert_eq!(cols, vec!["ndvi_ne".to_string(), "week_sin".to_string()]);
    }

    #[test]
    fn extra_exclusions_apply() {
        let cols = feature_columns(&frame(), TARGET_COLUMN, &["ndvi_ne".to_string()]);
        assert_eq!(cols, vec!["week_sin".to_string()]);
    }

    #[test]
    fn order_is_stable_and_deterministic() {
        let a = feature_columns(&frame(), TARGET_COLUMN, &[]);
        let b = feature_columns(&frame(), TARGET_COLUMN, &[]);
        assert_eq!(a, b);
    }
}
