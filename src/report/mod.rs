//! Formatted terminal output.
//!
//! Formatting lives in one place so the pipeline and fit code stay clean
//! and output changes are localized.

use crate::app::pipeline::{CityRun, PredictOutput};
use crate::domain::TrainConfig;

/// Summary printed after `dengue train`.
pub fn format_train_summary(runs: &[CityRun], config: &TrainConfig) -> String {
    let mut out = String::new();

    out.push_str("=== dengue - weekly case-count training ===\n");
    out.push_str(&format!("Run: {}\n", config.run_name));
    out.push_str(&format!(
        "Data: {} | artifacts: {}\n",
        config.data_dir.display(),
        config.artifacts_dir.display()
    ));
    out.push_str(&format!(
        "Holdout: earliest {:.0}% fit, rest validate (chronological)\n",
        config.split_ratio * 100.0
    ));

    for run in runs {
        let params = config.params_for(run.city);
        out.push_str(&format!(
            "\n{} ({}):\n",
            run.city.display_name(),
            run.city.code()
        ));
        out.push_str(&format!(
            "  rows: {} fit + {} val | features: {}\n",
            run.fit.n_fit,
            run.fit.n_val,
            run.feature_columns.len()
        ));
        out.push_str(&format!(
            "  model: {} trees, depth {}, lr {}\n",
            run.fit.model.trees.len(),
            params.max_depth,
            params.learning_rate
        ));
        out.push_str(&format!("  val MAE: {:.4}\n", run.fit.mae));
    }

    out
}

/// Summary printed after `dengue predict`.
pub fn format_predict_summary(output: &PredictOutput) -> String {
    let mut out = String::new();

    out.push_str("=== dengue - submission predictions ===\n");
    for (city, rows) in &output.submission.per_city {
        out.push_str(&format!(
            "{} ({}): {rows} weekly predictions\n",
            city.display_name(),
            city.code()
        ));
    }
    out.push_str(&format!(
        "Submission written: {} ({} rows)\n",
        output.out_path.display(),
        output.submission.rows
    ));

    out
}
