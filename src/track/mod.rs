//! Run recording.
//!
//! Training reports parameters, metrics, and artifact paths through an
//! injected `RunRecorder` rather than any process-global tracking state, so
//! the pipeline has no dependency on a particular tracking backend. The
//! built-in backends are a JSON file summary and a no-op.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::AppError;

pub trait RunRecorder {
    fn record_param(&mut self, key: &str, value: &str);
    fn record_metric(&mut self, key: &str, value: f64);
    fn record_artifact(&mut self, path: &Path);
}

/// Accumulates a run and writes it as one JSON document.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRecorder {
    pub run_name: String,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    pub artifacts: Vec<PathBuf>,
}

impl JsonRecorder {
    pub fn new(run_name: impl Into<String>) -> Self {
        Self {
            run_name: run_name.into(),
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            artifacts: Vec::new(),
        }
    }

    /// Write the accumulated run summary.
    pub fn write_json(&self, path: &Path) -> Result<(), AppError> {
        let file = File::create(path).map_err(|e| {
            AppError::input(format!(
                "Failed to create run summary '{}': {e}",
                path.display()
            ))
        })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| AppError::input(format!("Failed to write run summary: {e}")))
    }
}

impl RunRecorder for JsonRecorder {
    fn record_param(&mut self, key: &str, value: &str) {
        self.params.insert(key.to_string(), value.to_string());
    }

    fn record_metric(&mut self, key: &str, value: f64) {
        self.metrics.insert(key.to_string(), value);
    }

    fn record_artifact(&mut self, path: &Path) {
        self.artifacts.push(path.to_path_buf());
    }
}

/// Discards everything; useful for tests and for prediction runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl RunRecorder for NoopRecorder {
    fn record_param(&mut self, _key: &str, _value: &str) {}
    fn record_metric(&mut self, _key: &str, _value: f64) {}
    fn record_artifact(&mut self, _path: &Path) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_recorder_accumulates_and_orders_keys() {
        let mut recorder = JsonRecorder::new("baseline");
        recorder.record_metric("mae_sj", 22.5);
        recorder.record_metric("mae_iq", 6.1);
        recorder.record_param("sj_n_estimators", "1500");
        recorder.record_artifact(Path::new("artifacts/model_sj.json"));

        assert_eq!(recorder.metrics.len(), 2);
        // BTreeMap keeps metric keys sorted for stable JSON output.
        let keys: Vec<&String> = recorder.metrics.keys().collect();
        assert_eq!(keys, vec!["mae_iq", "mae_sj"]);
        assert_eq!(recorder.artifacts.len(), 1);
    }
}
