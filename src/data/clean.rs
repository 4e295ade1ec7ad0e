//! Per-city split, time ordering, and gap filling.
//!
//! Contract: filter a merged table down to one city, sort ascending by
//! (year, weekofyear), then forward-fill and backward-fill every value
//! column. The fill deliberately includes the target when present (see
//! DESIGN.md). A city with zero rows yields an empty frame, not an error;
//! validating that is the caller's job.

use crate::domain::{City, SeriesFrame};
use crate::error::AppError;
use crate::io::ingest::RawTable;

/// One city's rows, time-ordered, without any fill.
///
/// Used for test features, which must keep their genuine gaps until the
/// feature engine's post-fill step.
pub fn city_frame(table: &RawTable, city: City) -> Result<SeriesFrame, AppError> {
    let mut frame = SeriesFrame::with_columns(city, &table.value_names);
    for row in &table.rows {
        if City::parse(&row.city) != Some(city) {
            continue;
        }
        // Ingest guarantees the width, but a mismatch is still a data error
        // rather than a silent drop.
        frame.push_row(row.key, row.values.clone())?;
    }
    frame.sort_by_time();
    Ok(frame)
}

/// One city's rows, time-ordered and gap-filled (forward then backward).
pub fn clean_city_frame(table: &RawTable, city: City) -> Result<SeriesFrame, AppError> {
    let mut frame = city_frame(table, city)?;
    let names = frame.column_names().to_vec();
    frame.fill_forward_backward(&names);
    Ok(frame)
}
