//! The feature engine: deterministic, leakage-safe feature construction
//! shared identically between train and test.
//!
//! Train and test rows for one city are concatenated (with an origin tag)
//! before any feature step runs, and re-split afterwards. Running every step
//! once over the combined frame is what guarantees the column-parity
//! invariant: train and test outputs always carry exactly the same column
//! set, and rolling/lag windows at the train/test boundary see genuine
//! history instead of an artificial series start.
//!
//! Do not "optimize" this into separate per-side passes; that reintroduces
//! the column-mismatch risk this design exists to prevent.
//!
//! The other core rule lives in `shifted_rolling_mean`: a rolling feature
//! for the row at time `t` must never include row `t`'s own value, so the
//! series is shifted by one before windowing.

use crate::domain::{Origin, SeriesFrame};
use crate::error::AppError;
use crate::features::FeatureConfig;

/// Default rolling-mean source columns, filtered to those present.
const ROLL_CANDIDATES: [&str; 10] = [
    "reanalysis_specific_humidity_g_per_kg",
    "reanalysis_dew_point_temp_k",
    "reanalysis_air_temp_k",
    "reanalysis_min_air_temp_k",
    "reanalysis_max_air_temp_k",
    "station_avg_temp_c",
    "station_min_temp_c",
    "station_max_temp_c",
    "precipitation_amt_mm",
    "reanalysis_precip_amt_kg_per_m2",
];

/// Default lag source columns, filtered to those present.
const LAG_CANDIDATES: [&str; 5] = [
    "reanalysis_specific_humidity_g_per_kg",
    "reanalysis_dew_point_temp_k",
    "reanalysis_air_temp_k",
    "station_avg_temp_c",
    "precipitation_amt_mm",
];

/// One city's train and test rows glued together for feature construction.
///
/// Exists only inside this module; the origin tag is per-row state parallel
/// to the frame and is dropped on re-split.
struct CombinedFrame {
    frame: SeriesFrame,
    origin: Vec<Origin>,
    /// True when the test side had no target column and one was synthesized
    /// as all-missing so the frames could be concatenated.
    synthesized_target: bool,
}

impl CombinedFrame {
    fn concat(train: &SeriesFrame, test: &SeriesFrame, target: &str) -> Result<Self, AppError> {
        if train.city() != test.city() {
            return Err(AppError::input(format!(
                "Cannot combine '{}' train rows with '{}' test rows.",
                train.city().code(),
                test.city().code()
            )));
        }

        // Column union, train order first. The usual case is test == train
        // minus the target; a test-only column still lands in both outputs
        // (all-missing on the train side) so parity holds.
        let mut names: Vec<String> = train.column_names().to_vec();
        for name in test.column_names() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        let synthesized_target = !test.has_column(target);

        let mut frame = SeriesFrame::with_columns(train.city(), &names);
        for source in [train, test] {
            for i in 0..source.len() {
                let values = names
                    .iter()
                    .map(|name| source.column(name).and_then(|col| col[i]))
                    .collect();
                frame.push_row(source.keys()[i], values)?;
            }
        }

        let mut origin = vec![Origin::Train; train.len()];
        origin.extend(std::iter::repeat_n(Origin::Test, test.len()));

        let mut combined = Self {
            frame,
            origin,
            synthesized_target,
        };
        combined.sort_by_time();
        Ok(combined)
    }

    fn sort_by_time(&mut self) {
        let perm = self.frame.sort_by_time();
        self.origin = perm.iter().map(|&i| self.origin[i]).collect();
    }

    fn split(self) -> (SeriesFrame, SeriesFrame) {
        let train_rows: Vec<usize> = self
            .origin
            .iter()
            .enumerate()
            .filter_map(|(i, &o)| (o == Origin::Train).then_some(i))
            .collect();
        let test_rows: Vec<usize> = self
            .origin
            .iter()
            .enumerate()
            .filter_map(|(i, &o)| (o == Origin::Test).then_some(i))
            .collect();
        (
            self.frame.take_rows(&train_rows),
            self.frame.take_rows(&test_rows),
        )
    }
}

/// Run the full feature engine for one city and re-split into train/test.
///
/// Steps, in fixed order (later steps may depend on earlier columns):
/// calendar encoding, interactions, rolling means, lags, optional target
/// lags, post-fill, re-split.
pub fn build_city_features(
    train: &SeriesFrame,
    test: &SeriesFrame,
    config: &FeatureConfig,
) -> Result<(SeriesFrame, SeriesFrame), AppError> {
    let mut combined = CombinedFrame::concat(train, test, &config.target)?;

    add_calendar_features(&mut combined.frame)?;
    add_interaction_features(&mut combined.frame)?;

    let roll_columns = resolve_columns(&combined.frame, &config.roll_columns, &ROLL_CANDIDATES);
    add_rolling_features(&mut combined.frame, &roll_columns, &config.roll_windows)?;

    let lag_columns = resolve_columns(&combined.frame, &config.lag_columns, &LAG_CANDIDATES);
    add_lag_features(&mut combined.frame, &lag_columns, &config.lags)?;

    let mut no_fill: Vec<String> = vec![config.target.clone()];
    if config.include_case_lags && combined.frame.has_column(&config.target) {
        for &lag in &config.case_lags {
            let name = case_lag_name(lag);
            add_single_lag(&mut combined.frame, &config.target, &name, lag)?;
            no_fill.push(name);
        }
    }

    // Post-fill: repair the missing values that windowing/lag introduced at
    // series boundaries, within city, after re-sorting by time. The target
    // and its lag columns are exempt; test rows must not inherit fabricated
    // case counts.
    combined.sort_by_time();
    let fill_names: Vec<String> = combined
        .frame
        .column_names()
        .iter()
        .filter(|name| !no_fill.contains(name))
        .cloned()
        .collect();
    combined.frame.fill_forward_backward(&fill_names);

    let synthesized_target = combined.synthesized_target;
    let target = config.target.clone();
    let (train_out, mut test_out) = combined.split();
    if synthesized_target {
        test_out.drop_column(&target);
    }
    Ok((train_out, test_out))
}

/// Seasonality encoding: week-of-year mapped onto the unit circle.
pub fn add_calendar_features(frame: &mut SeriesFrame) -> Result<(), AppError> {
    let (sin, cos): (Vec<Option<f64>>, Vec<Option<f64>>) = frame
        .keys()
        .iter()
        .map(|key| {
            let angle = 2.0 * std::f64::consts::PI * f64::from(key.week) / 52.0;
            (Some(angle.sin()), Some(angle.cos()))
        })
        .unzip();
    frame.insert_column("week_sin", sin)?;
    frame.insert_column("week_cos", cos)?;
    Ok(())
}

/// Derived interaction columns, each added only if its sources exist.
pub fn add_interaction_features(frame: &mut SeriesFrame) -> Result<(), AppError> {
    if let (Some(max_t), Some(min_t)) = (
        frame.column("reanalysis_max_air_temp_k"),
        frame.column("reanalysis_min_air_temp_k"),
    ) {
        let range: Vec<Option<f64>> = max_t
            .iter()
            .zip(min_t.iter())
            .map(|(&hi, &lo)| Some(hi? - lo?))
            .collect();
        frame.insert_column("reanalysis_temp_range_k", range)?;
    }

    if let (Some(temp), Some(humidity)) = (
        frame.column("reanalysis_air_temp_k"),
        frame.column("reanalysis_relative_humidity_percent"),
    ) {
        let product: Vec<Option<f64>> = temp
            .iter()
            .zip(humidity.iter())
            .map(|(&t, &h)| Some(t? * h?))
            .collect();
        frame.insert_column("temp_humidity_interaction", product)?;
    }

    Ok(())
}

/// Rolling means of the **previous** `window` observations, per source
/// column. The frame must already be time-sorted.
pub fn add_rolling_features(
    frame: &mut SeriesFrame,
    columns: &[String],
    windows: &[usize],
) -> Result<(), AppError> {
    for name in columns {
        let Some(values) = frame.column(name) else {
            continue;
        };
        let values = values.to_vec();
        for &window in windows {
            let rolled = shifted_rolling_mean(&values, window);
            frame.insert_column(&format!("{name}_roll{window}"), rolled)?;
        }
    }
    Ok(())
}

/// Lagged copies of each source column. The frame must be time-sorted.
pub fn add_lag_features(
    frame: &mut SeriesFrame,
    columns: &[String],
    lags: &[usize],
) -> Result<(), AppError> {
    for name in columns {
        for &lag in lags {
            let out_name = format!("{name}_lag{lag}");
            add_single_lag(frame, name, &out_name, lag)?;
        }
    }
    Ok(())
}

pub fn case_lag_name(lag: usize) -> String {
    format!("cases_lag_{lag}")
}

fn add_single_lag(
    frame: &mut SeriesFrame,
    source: &str,
    out_name: &str,
    lag: usize,
) -> Result<(), AppError> {
    let Some(values) = frame.column(source) else {
        return Ok(());
    };
    let lagged: Vec<Option<f64>> = (0..values.len())
        .map(|i| if i >= lag { values[i - lag] } else { None })
        .collect();
    frame.insert_column(out_name, lagged)
}

/// Mean of the previous `window` observations, excluding the current row.
///
/// The shift-by-one is the leakage-avoidance rule: the value at index `i`
/// depends only on indices `< i`. Missing values inside the window are
/// skipped, and any single present value is enough (minimum window of 1),
/// so early rows use whatever history exists.
fn shifted_rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let mut out = vec![None; n];
    for i in 0..n {
        let lo = i.saturating_sub(window);
        let mut sum = 0.0;
        let mut count = 0usize;
        for value in values[lo..i].iter().flatten() {
            sum += value;
            count += 1;
        }
        if count > 0 {
            out[i] = Some(sum / count as f64);
        }
    }
    out
}

fn resolve_columns(
    frame: &SeriesFrame,
    configured: &Option<Vec<String>>,
    candidates: &[&str],
) -> Vec<String> {
    match configured {
        Some(columns) => columns
            .iter()
            .filter(|name| frame.has_column(name))
            .cloned()
            .collect(),
        None => candidates
            .iter()
            .filter(|name| frame.has_column(name))
            .map(|name| name.to_string())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{City, ObservationKey, TARGET_COLUMN};

    fn frame_from(
        city: City,
        columns: &[(&str, &[Option<f64>])],
        first_week: u32,
    ) -> SeriesFrame {
        let names: Vec<String> = columns.iter().map(|(name, _)| name.to_string()).collect();
        let mut frame = SeriesFrame::with_columns(city, &names);
        let rows = columns.first().map_or(0, |(_, values)| values.len());
        for i in 0..rows {
            let values = columns.iter().map(|(_, col)| col[i]).collect();
            frame
                .push_row(ObservationKey::new(2000, first_week + i as u32), values)
                .unwrap();
        }
        frame
    }

    fn humidity_train_test() -> (SeriesFrame, SeriesFrame) {
        let train = frame_from(
            City::SanJuan,
            &[
                (
                    "reanalysis_specific_humidity_g_per_kg",
                    &[Some(10.0), Some(20.0)],
                ),
                (TARGET_COLUMN, &[Some(3.0), Some(4.0)]),
            ],
            1,
        );
        let test = frame_from(
            City::SanJuan,
            &[(
                "reanalysis_specific_humidity_g_per_kg",
                &[Some(30.0)],
            )],
            3,
        );
        (train, test)
    }

    #[test]
    fn calendar_encoding_stays_on_the_unit_circle() {
        let mut frame = SeriesFrame::with_columns(City::SanJuan, &[]);
        for week in 1..=52u32 {
            frame.push_row(ObservationKey::new(2000, week), vec![]).unwrap();
        }
        add_calendar_features(&mut frame).unwrap();

        let sin = frame.column("week_sin").unwrap();
        let cos = frame.column("week_cos").unwrap();
        for i in 0..frame.len() {
            let (s, c) = (sin[i].unwrap(), cos[i].unwrap());
            assert!((s * s + c * c - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn interactions_degrade_gracefully_when_sources_missing() {
        let mut frame = frame_from(
            City::SanJuan,
            &[("reanalysis_max_air_temp_k", &[Some(305.0)])],
            1,
        );
        add_interaction_features(&mut frame).unwrap();
        assert!(!frame.has_column("reanalysis_temp_range_k"));
        assert!(!frame.has_column("temp_humidity_interaction"));
    }

    #[test]
    fn interactions_compute_range_and_product() {
        let mut frame = frame_from(
            City::SanJuan,
            &[
                ("reanalysis_max_air_temp_k", &[Some(305.0)]),
                ("reanalysis_min_air_temp_k", &[Some(295.0)]),
                ("reanalysis_air_temp_k", &[Some(300.0)]),
                ("reanalysis_relative_humidity_percent", &[Some(80.0)]),
            ],
            1,
        );
        add_interaction_features(&mut frame).unwrap();
        assert_eq!(
            frame.column("reanalysis_temp_range_k").unwrap(),
            &[Some(10.0)]
        );
        assert_eq!(
            frame.column("temp_humidity_interaction").unwrap(),
            &[Some(24_000.0)]
        );
    }

    #[test]
    fn interactions_stay_missing_when_either_source_cell_is() {
        let mut frame = frame_from(
            City::SanJuan,
            &[
                ("reanalysis_max_air_temp_k", &[Some(305.0), None]),
                ("reanalysis_min_air_temp_k", &[Some(295.0), Some(296.0)]),
                ("reanalysis_air_temp_k", &[None, Some(300.0)]),
                ("reanalysis_relative_humidity_percent", &[Some(80.0), Some(85.0)]),
            ],
            1,
        );
        add_interaction_features(&mut frame).unwrap();
        assert_eq!(
            frame.column("reanalysis_temp_range_k").unwrap(),
            &[Some(10.0), None]
        );
        assert_eq!(
            frame.column("temp_humidity_interaction").unwrap(),
            &[None, Some(25_500.0)]
        );
    }

    #[test]
    fn rolling_mean_excludes_the_current_row() {
        // Weeks [1,2,3] with humidity [10,20,30]: window 2 at index 2 must be
        // mean(10,20)=15, not mean(10,20,30).
        let values = [Some(10.0), Some(20.0), Some(30.0)];
        let rolled = shifted_rolling_mean(&values, 2);
        assert_eq!(rolled, vec![None, Some(10.0), Some(15.0)]);
    }

    #[test]
    fn rolling_mean_skips_missing_and_honors_min_window_of_one() {
        let values = [Some(10.0), None, Some(30.0), Some(40.0)];
        let rolled = shifted_rolling_mean(&values, 3);
        assert_eq!(
            rolled,
            vec![None, Some(10.0), Some(10.0), Some(20.0)]
        );
    }

    #[test]
    fn rolling_feature_never_depends_on_its_own_row() {
        let base = [Some(10.0), Some(20.0), Some(30.0), Some(40.0), Some(50.0)];
        let mut perturbed = base;
        let t = 2;
        perturbed[t] = Some(999.0);

        let rolled_base = shifted_rolling_mean(&base, 3);
        let rolled_pert = shifted_rolling_mean(&perturbed, 3);

        // Unchanged at t, changed at t+1..t+w.
        assert_eq!(rolled_base[t], rolled_pert[t]);
        assert_ne!(rolled_base[t + 1], rolled_pert[t + 1]);
        assert_ne!(rolled_base[t + 2], rolled_pert[t + 2]);
    }

    #[test]
    fn lag_k_is_exact_with_leading_missing_markers() {
        let mut frame = frame_from(
            City::SanJuan,
            &[(
                "reanalysis_air_temp_k",
                &[Some(1.0), Some(2.0), Some(3.0), Some(4.0)],
            )],
            1,
        );
        add_lag_features(
            &mut frame,
            &["reanalysis_air_temp_k".to_string()],
            &[2],
        )
        .unwrap();
        assert_eq!(
            frame.column("reanalysis_air_temp_k_lag2").unwrap(),
            &[None, None, Some(1.0), Some(2.0)]
        );
    }

    #[test]
    fn concat_then_split_preserves_row_counts_and_column_parity() {
        let (train, test) = humidity_train_test();
        let config = FeatureConfig::default();
        let (train_out, test_out) = build_city_features(&train, &test, &config).unwrap();

        assert_eq!(train_out.len(), 2);
        assert_eq!(test_out.len(), 1);

        // Identical column lists, ignoring the target (synthesized on the
        // test side and dropped again).
        let train_cols: Vec<&String> = train_out
            .column_names()
            .iter()
            .filter(|c| c.as_str() != TARGET_COLUMN)
            .collect();
        let test_cols: Vec<&String> = test_out.column_names().iter().collect();
        assert_eq!(train_cols, test_cols);
        assert!(train_out.has_column(TARGET_COLUMN));
        assert!(!test_out.has_column(TARGET_COLUMN));
    }

    #[test]
    fn column_parity_holds_for_unusual_window_and_lag_configs() {
        let (train, test) = humidity_train_test();
        let config = FeatureConfig {
            roll_windows: vec![1, 2, 4],
            lags: vec![1, 5],
            include_case_lags: true,
            case_lags: vec![1, 2],
            ..FeatureConfig::default()
        };
        let (train_out, test_out) = build_city_features(&train, &test, &config).unwrap();

        let train_cols: Vec<&String> = train_out
            .column_names()
            .iter()
            .filter(|c| c.as_str() != TARGET_COLUMN)
            .collect();
        let test_cols: Vec<&String> = test_out.column_names().iter().collect();
        assert_eq!(train_cols, test_cols);
    }

    #[test]
    fn rolling_windows_see_history_across_the_train_test_boundary() {
        let (train, test) = humidity_train_test();
        let config = FeatureConfig::default();
        let (_, test_out) = build_city_features(&train, &test, &config).unwrap();

        // The single test row (week 3) sees the two train values.
        let roll3 = test_out
            .column("reanalysis_specific_humidity_g_per_kg_roll3")
            .unwrap();
        assert_eq!(roll3, &[Some(15.0)]);
    }

    #[test]
    fn post_fill_leaves_no_gaps_except_test_side_case_lags() {
        // Long enough that every default lag (1..3) lands in range at least
        // once, so backward fill can repair each lag column's leading gap.
        let train = frame_from(
            City::SanJuan,
            &[
                (
                    "reanalysis_specific_humidity_g_per_kg",
                    &[Some(10.0), Some(20.0), Some(30.0), Some(40.0)],
                ),
                (TARGET_COLUMN, &[Some(3.0), Some(4.0), Some(5.0), Some(6.0)]),
            ],
            1,
        );
        let test = frame_from(
            City::SanJuan,
            &[("reanalysis_specific_humidity_g_per_kg", &[Some(50.0)])],
            5,
        );
        let config = FeatureConfig {
            include_case_lags: true,
            ..FeatureConfig::default()
        };
        let (train_out, test_out) = build_city_features(&train, &test, &config).unwrap();

        for name in test_out.column_names() {
            let column = test_out.column(name).unwrap();
            if name.starts_with("cases_lag_") {
                continue;
            }
            assert!(
                column.iter().all(Option::is_some),
                "unexpected gap in test column {name}"
            );
        }

        // cases_lag_1 on the test row reaches back into train history only
        // when the lag actually lands on a train row; lag 3 reaches past the
        // series start and stays missing on row 0 of train.
        let lag3 = train_out.column("cases_lag_3").unwrap();
        assert_eq!(lag3[0], None);
    }

    #[test]
    fn case_lags_on_test_rows_are_missing_when_out_of_reach() {
        let train = frame_from(
            City::Iquitos,
            &[
                ("precipitation_amt_mm", &[Some(1.0), Some(2.0)]),
                (TARGET_COLUMN, &[Some(5.0), Some(6.0)]),
            ],
            1,
        );
        let test = frame_from(
            City::Iquitos,
            &[("precipitation_amt_mm", &[Some(3.0), Some(4.0)])],
            3,
        );
        let config = FeatureConfig {
            include_case_lags: true,
            case_lags: vec![3],
            ..FeatureConfig::default()
        };
        let (_, test_out) = build_city_features(&train, &test, &config).unwrap();

        // The combined series is [w1, w2, w3, w4]; lag 3 from the second
        // test row (w4) lands on train w1's target, while the first test
        // row (w3) reaches past the series start and stays missing.
        let lags = test_out.column("cases_lag_3").unwrap();
        assert_eq!(lags, &[None, Some(5.0)]);
    }

    #[test]
    fn mismatched_cities_are_rejected() {
        let train = frame_from(City::SanJuan, &[(TARGET_COLUMN, &[Some(1.0)])], 1);
        let test = frame_from(City::Iquitos, &[], 2);
        let err = build_city_features(&train, &test, &FeatureConfig::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
