//! CSV ingest and normalization.
//!
//! This module turns a raw dengue CSV (features, labels, or submission
//! format) into typed observation rows that are safe to merge and split.
//!
//! Design goals:
//! - **Strict schema** for the key columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (file order preserved; no hidden coercions)
//! - **Separation of concerns**: no merging or feature logic here

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;

use crate::domain::ObservationKey;
use crate::error::AppError;

/// Key columns held structurally on every table.
pub const KEY_COLUMNS: [&str; 4] = ["city", "year", "weekofyear", "week_start_date"];

/// One parsed observation row.
///
/// `values` aligns with the owning table's `value_names`; cells that were
/// empty or non-numeric are `None`.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub city: String,
    pub key: ObservationKey,
    pub values: Vec<Option<f64>>,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: typed rows + value-column names + row errors.
#[derive(Debug, Clone)]
pub struct RawTable {
    /// Non-key column names, normalized to lowercase, in file order.
    pub value_names: Vec<String>,
    pub rows: Vec<RawRow>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

impl RawTable {
    pub fn value_index(&self, name: &str) -> Option<usize> {
        self.value_names.iter().position(|n| n == name)
    }
}

/// Load a dengue CSV keyed by (city, year, weekofyear).
pub fn read_observation_table(path: &Path) -> Result<RawTable, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::input(format!("Failed to open CSV '{}': {e}", path.display()))
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read CSV headers: {e}")))?
        .clone();

    let header_map = build_header_map(&headers);
    ensure_key_columns_exist(path, &header_map)?;

    // Everything that is not a key column is a value column, in file order.
    let mut value_names: Vec<(usize, String)> = header_map
        .iter()
        .filter(|(name, _)| !KEY_COLUMNS.contains(&name.as_str()))
        .map(|(name, &idx)| (idx, name.clone()))
        .collect();
    value_names.sort_by_key(|(idx, _)| *idx);
    let value_indices: Vec<usize> = value_names.iter().map(|(idx, _)| *idx).collect();
    let value_names: Vec<String> = value_names.into_iter().map(|(_, name)| name).collect();

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: records() starts after the header row, CSV lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &header_map, &value_indices) {
            Ok(row) => rows.push(row),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if rows.is_empty() {
        return Err(AppError::data(format!(
            "No usable rows in '{}'.",
            path.display()
        )));
    }

    Ok(RawTable {
        value_names,
        rows,
        row_errors,
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. If we don't strip it, schema validation will incorrectly
    // report the `city` column as missing.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn ensure_key_columns_exist(
    path: &Path,
    header_map: &HashMap<String, usize>,
) -> Result<(), AppError> {
    for name in ["city", "year", "weekofyear"] {
        if !header_map.contains_key(name) {
            return Err(AppError::input(format!(
                "'{}' is missing required column: `{name}`",
                path.display()
            )));
        }
    }
    Ok(())
}

fn parse_row(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    value_indices: &[usize],
) -> Result<RawRow, String> {
    let city = get_required(record, header_map, "city")?.to_string();
    let year = get_required(record, header_map, "year")?
        .parse::<i32>()
        .map_err(|_| "Invalid `year` value.".to_string())?;
    let week = get_required(record, header_map, "weekofyear")?
        .parse::<u32>()
        .map_err(|_| "Invalid `weekofyear` value.".to_string())?;
    if !(1..=53).contains(&week) {
        return Err(format!("`weekofyear` {week} outside expected range 1-53."));
    }

    let week_start = get_optional(record, header_map, "week_start_date")
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());

    let values = value_indices
        .iter()
        .map(|&idx| parse_opt_f64(record.get(idx)))
        .collect();

    Ok(RawRow {
        city,
        key: ObservationKey {
            year,
            week,
            week_start,
        },
        values,
    })
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
