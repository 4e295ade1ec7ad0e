//! Submission export.
//!
//! The output file is a copy of `submission_format.csv` with its target
//! column overwritten, per city, by clipped and rounded predictions. Row
//! order and all other columns are preserved byte-for-byte semantics-wise,
//! which is what the scoring side expects.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use crate::domain::{City, TARGET_COLUMN};
use crate::error::AppError;

/// What was written, for reporting.
#[derive(Debug, Clone)]
pub struct SubmissionSummary {
    pub rows: usize,
    pub per_city: Vec<(City, usize)>,
}

/// Copy the submission format, filling `total_cases` per city.
///
/// `predictions` must hold, for each city, exactly as many values as the
/// format file has rows for that city, in the same (time) order the format
/// lists them. Any mismatch is a data error.
pub fn write_submission(
    format_path: &Path,
    out_path: &Path,
    predictions: &HashMap<City, Vec<f64>>,
) -> Result<SubmissionSummary, AppError> {
    let file = File::open(format_path).map_err(|e| {
        AppError::input(format!(
            "Failed to open submission format '{}': {e}",
            format_path.display()
        ))
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read submission headers: {e}")))?
        .clone();

    let city_idx = header_position(&headers, "city").ok_or_else(|| {
        AppError::input("Submission format is missing required column: `city`")
    })?;
    let target_idx = header_position(&headers, TARGET_COLUMN).ok_or_else(|| {
        AppError::input(format!(
            "Submission format is missing required column: `{TARGET_COLUMN}`"
        ))
    })?;

    let out_file = File::create(out_path).map_err(|e| {
        AppError::input(format!(
            "Failed to create submission '{}': {e}",
            out_path.display()
        ))
    })?;
    let mut writer = csv::Writer::from_writer(out_file);
    writer
        .write_record(&headers)
        .map_err(|e| AppError::input(format!("Failed to write submission header: {e}")))?;

    let mut cursors: HashMap<City, usize> = HashMap::new();
    let mut rows = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.map_err(|e| {
            AppError::input(format!("Submission format parse error at line {line}: {e}"))
        })?;

        let city_code = record.get(city_idx).unwrap_or("");
        let city = City::parse(city_code).ok_or_else(|| {
            AppError::data(format!(
                "Unknown city '{city_code}' in submission format at line {line}."
            ))
        })?;

        let cursor = cursors.entry(city).or_insert(0);
        let prediction = predictions
            .get(&city)
            .and_then(|values| values.get(*cursor))
            .ok_or_else(|| {
                AppError::data(format!(
                    "Submission format has more '{}' rows than predictions ({}).",
                    city.code(),
                    predictions.get(&city).map_or(0, Vec::len)
                ))
            })?;
        *cursor += 1;

        let rounded = prediction.max(0.0).round() as i64;
        let fields: Vec<String> = record
            .iter()
            .enumerate()
            .map(|(i, field)| {
                if i == target_idx {
                    rounded.to_string()
                } else {
                    field.to_string()
                }
            })
            .collect();
        writer
            .write_record(&fields)
            .map_err(|e| AppError::input(format!("Failed to write submission row: {e}")))?;
        rows += 1;
    }

    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to flush submission: {e}")))?;

    // Leftover predictions mean the format and the test set disagree.
    let mut per_city = Vec::new();
    for (&city, values) in predictions {
        let used = cursors.get(&city).copied().unwrap_or(0);
        if used != values.len() {
            return Err(AppError::data(format!(
                "Submission format has {used} '{}' rows but {} predictions were produced.",
                city.code(),
                values.len()
            )));
        }
        per_city.push((city, used));
    }
    per_city.sort_by_key(|(city, _)| city.code());
    per_city.reverse(); // "sj" before "iq" matches the dataset's city order

    Ok(SubmissionSummary { rows, per_city })
}

fn header_position(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| {
        h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_temp(name_hint: &str, contents: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "dengue-export-{name_hint}-{}-{:?}.csv",
            std::process::id(),
            std::thread::current().id()
        ));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn fills_target_per_city_in_order() {
        let format_path = write_temp(
            "ok",
            "city,year,weekofyear,total_cases\n\
             sj,2008,18,0\n\
             sj,2008,19,0\n\
             iq,2010,26,0\n",
        );
        let out_path = write_temp("out", "");

        let mut predictions = HashMap::new();
        predictions.insert(City::SanJuan, vec![12.4, 13.6]);
        predictions.insert(City::Iquitos, vec![-0.7]);

        let summary = write_submission(&format_path, &out_path, &predictions).unwrap();
        assert_eq!(summary.rows, 3);

        let written = std::fs::read_to_string(&out_path).unwrap();
        std::fs::remove_file(&format_path).ok();
        std::fs::remove_file(&out_path).ok();

        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[1], "sj,2008,18,12");
        assert_eq!(lines[2], "sj,2008,19,14");
        // Negative model output clipped to zero before rounding.
        assert_eq!(lines[3], "iq,2010,26,0");
    }

    #[test]
    fn prediction_count_mismatch_is_a_data_error() {
        let format_path = write_temp(
            "short",
            "city,year,weekofyear,total_cases\nsj,2008,18,0\n",
        );
        let out_path = write_temp("short-out", "");

        let mut predictions = HashMap::new();
        predictions.insert(City::SanJuan, vec![1.0, 2.0]);
        predictions.insert(City::Iquitos, Vec::new());

        let err = write_submission(&format_path, &out_path, &predictions).unwrap_err();
        std::fs::remove_file(&format_path).ok();
        std::fs::remove_file(&out_path).ok();
        assert_eq!(err.exit_code(), 3);
    }
}
