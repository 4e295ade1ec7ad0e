//! Column-oriented table for one city's weekly series.
//!
//! `SeriesFrame` is the in-memory shape every pipeline stage works on:
//! identifier fields (year, week, week-start date) live in `keys`, all value
//! columns are `Option<f64>` vectors with a stable name order. Missing cells
//! are `None`, never NaN, so imputation policy stays explicit.
//!
//! Transformations that reorder or subset rows return new frames or apply a
//! permutation to every column at once; callers never see a frame whose
//! columns disagree on length.

use std::collections::HashMap;

use crate::domain::types::{City, ObservationKey};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct SeriesFrame {
    city: City,
    keys: Vec<ObservationKey>,
    names: Vec<String>,
    index: HashMap<String, usize>,
    columns: Vec<Vec<Option<f64>>>,
}

impl SeriesFrame {
    /// Empty frame with a fixed set of value columns.
    pub fn with_columns(city: City, names: &[String]) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
        Self {
            city,
            keys: Vec::new(),
            names: names.to_vec(),
            index,
            columns: vec![Vec::new(); names.len()],
        }
    }

    pub fn city(&self) -> City {
        self.city
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Value-column names in their stable order.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.index.get(name).map(|&idx| self.columns[idx].as_slice())
    }

    pub fn keys(&self) -> &[ObservationKey] {
        &self.keys
    }

    /// Append one row; `values` must align with `column_names()`.
    pub fn push_row(
        &mut self,
        key: ObservationKey,
        values: Vec<Option<f64>>,
    ) -> Result<(), AppError> {
        if values.len() != self.names.len() {
            return Err(AppError::data(format!(
                "Row width {} does not match column count {}.",
                values.len(),
                self.names.len()
            )));
        }
        self.keys.push(key);
        for (column, value) in self.columns.iter_mut().zip(values) {
            column.push(value);
        }
        Ok(())
    }

    /// Add a column (or replace an existing one of the same name).
    pub fn insert_column(
        &mut self,
        name: &str,
        values: Vec<Option<f64>>,
    ) -> Result<(), AppError> {
        if values.len() != self.len() {
            return Err(AppError::data(format!(
                "Column '{name}' has {} values for {} rows.",
                values.len(),
                self.len()
            )));
        }
        match self.index.get(name) {
            Some(&idx) => self.columns[idx] = values,
            None => {
                self.index.insert(name.to_string(), self.names.len());
                self.names.push(name.to_string());
                self.columns.push(values);
            }
        }
        Ok(())
    }

    /// Remove a column if present.
    pub fn drop_column(&mut self, name: &str) {
        let Some(idx) = self.index.remove(name) else {
            return;
        };
        self.names.remove(idx);
        self.columns.remove(idx);
        for slot in self.index.values_mut() {
            if *slot > idx {
                *slot -= 1;
            }
        }
    }

    /// Stable sort of rows by (year, week) ascending.
    ///
    /// Returns the applied permutation (`perm[new_pos] = old_pos`) so callers
    /// holding parallel per-row state (e.g. an origin tag) can reorder it too.
    pub fn sort_by_time(&mut self) -> Vec<usize> {
        let mut perm: Vec<usize> = (0..self.len()).collect();
        perm.sort_by_key(|&i| self.keys[i].time_key());
        self.apply_permutation(&perm);
        perm
    }

    fn apply_permutation(&mut self, perm: &[usize]) {
        self.keys = perm.iter().map(|&i| self.keys[i]).collect();
        for column in &mut self.columns {
            *column = perm.iter().map(|&i| column[i]).collect();
        }
    }

    /// New frame containing the given rows, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> SeriesFrame {
        let keys = rows.iter().map(|&i| self.keys[i]).collect();
        let columns = self
            .columns
            .iter()
            .map(|column| rows.iter().map(|&i| column[i]).collect())
            .collect();
        SeriesFrame {
            city: self.city,
            keys,
            names: self.names.clone(),
            index: self.index.clone(),
            columns,
        }
    }

    /// Forward-fill then backward-fill the named columns in place.
    ///
    /// Forward fill propagates the last present value into subsequent gaps;
    /// backward fill then repairs leading gaps from the first later value. A
    /// column that is entirely missing stays entirely missing.
    pub fn fill_forward_backward(&mut self, names: &[String]) {
        for name in names {
            let Some(&idx) = self.index.get(name) else {
                continue;
            };
            fill_column(&mut self.columns[idx]);
        }
    }
}

fn fill_column(values: &mut [Option<f64>]) {
    let mut last = None;
    for slot in values.iter_mut() {
        match *slot {
            Some(v) => last = Some(v),
            None => *slot = last,
        }
    }
    let mut next = None;
    for slot in values.iter_mut().rev() {
        match *slot {
            Some(v) => next = Some(v),
            None => *slot = next,
        }
    }
}
