//! Baseline calibration: per-channel drift correction.
//!
//! Two baseline estimators are supported: a constant baseline (the mean
//! of a fixed row window) and a linear drift baseline (a least-squares
//! line fitted through user-chosen rows, evaluated at every row). The
//! estimated baseline `b` is then combined with each raw value `v`
//! through one of three correction formulas.

use std::collections::BTreeSet;

use crate::data::model::{ColumnValues, Table};
use crate::error::{NoseError, Result};

/// Baselines smaller in magnitude than this are clamped to `+EPSILON`
/// before a dividing correction is applied. The clamp is always
/// positive, so a naturally negative near-zero baseline flips the sign
/// of the correction; this mirrors the instrument software's behaviour.
const EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Calibration settings
// ---------------------------------------------------------------------------

/// How a baseline value `b` corrects a raw value `v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationMethod {
    /// `v / b`
    Ratio,
    /// `v - b`
    Difference,
    /// `1 - v / b`
    InverseRatio,
}

impl CalibrationMethod {
    /// Whether the formula divides by the baseline (and therefore needs
    /// the near-zero clamp).
    pub fn divides(self) -> bool {
        !matches!(self, CalibrationMethod::Difference)
    }

    fn apply(self, v: f64, b: f64) -> f64 {
        match self {
            CalibrationMethod::Ratio => v / b,
            CalibrationMethod::Difference => v - b,
            CalibrationMethod::InverseRatio => 1.0 - v / b,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            CalibrationMethod::Ratio => "ratio (R/R0)",
            CalibrationMethod::Difference => "difference (R-R0)",
            CalibrationMethod::InverseRatio => "inverse ratio (1-R/R0)",
        }
    }
}

/// The active calibration of a dataset. Scoped to the active dataset:
/// switching datasets resets it to `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CalibrationSpec {
    /// No correction; `corrected == raw`.
    #[default]
    None,
    /// Per-channel mean over rows `[start, end)` as a constant baseline.
    Constant {
        start: usize,
        end: usize,
        method: CalibrationMethod,
    },
    /// Per-channel least-squares line through the values at `indices`,
    /// evaluated at every row as a drift baseline.
    Linear {
        indices: BTreeSet<usize>,
        method: CalibrationMethod,
    },
}

impl CalibrationSpec {
    pub fn is_none(&self) -> bool {
        matches!(self, CalibrationSpec::None)
    }

    /// Human-readable status line for display.
    pub fn status(&self) -> String {
        match self {
            CalibrationSpec::None => "No calibration applied; showing raw data".to_string(),
            CalibrationSpec::Constant { start, end, method } => format!(
                "Constant-window calibration, {} over rows {start}..{end}",
                method.describe()
            ),
            CalibrationSpec::Linear { indices, method } => format!(
                "Linear-drift calibration, {} through {} points",
                method.describe(),
                indices.len()
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------

/// Derive a corrected table from `raw` according to `spec`.
///
/// Always recomputes from `raw` in full; never incremental. On error the
/// caller's corrected table is untouched because nothing is returned.
pub fn calibrate(raw: &Table, spec: &CalibrationSpec) -> Result<Table> {
    match spec {
        CalibrationSpec::None => Ok(raw.clone()),
        CalibrationSpec::Constant { start, end, method } => {
            calibrate_constant(raw, *start, *end, *method)
        }
        CalibrationSpec::Linear { indices, method } => calibrate_linear(raw, indices, *method),
    }
}

fn calibrate_constant(
    raw: &Table,
    start: usize,
    end: usize,
    method: CalibrationMethod,
) -> Result<Table> {
    let rows = raw.n_rows();
    if start >= end || end > rows {
        return Err(NoseError::InvalidRange { start, end, rows });
    }

    let mut corrected = raw.clone();
    for column in corrected.columns_mut() {
        let ColumnValues::Numeric(values) = &mut column.values else {
            continue;
        };
        let mut baseline = window_mean(&values[start..end]);
        if method.divides() && baseline.abs() < EPSILON {
            baseline = EPSILON;
        }
        for v in values.iter_mut() {
            *v = method.apply(*v, baseline);
        }
    }
    log::info!(
        "Constant calibration applied: rows {start}..{end}, {}",
        method.describe()
    );
    Ok(corrected)
}

fn calibrate_linear(
    raw: &Table,
    indices: &BTreeSet<usize>,
    method: CalibrationMethod,
) -> Result<Table> {
    let rows = raw.n_rows();
    let valid: Vec<usize> = indices.iter().copied().filter(|&i| i < rows).collect();
    if valid.len() < 2 {
        return Err(NoseError::InsufficientPoints {
            needed: 2,
            got: valid.len(),
        });
    }

    let mut corrected = raw.clone();
    for column in corrected.columns_mut() {
        let ColumnValues::Numeric(values) = &mut column.values else {
            continue;
        };
        let points: Vec<(f64, f64)> = valid.iter().map(|&i| (i as f64, values[i])).collect();
        let (slope, intercept) = fit_line(&points);
        for (row, v) in values.iter_mut().enumerate() {
            let mut baseline = slope * row as f64 + intercept;
            if method.divides() && baseline.abs() < EPSILON {
                baseline = EPSILON;
            }
            *v = method.apply(*v, baseline);
        }
    }
    log::info!(
        "Linear calibration applied: {} fit points, {}",
        valid.len(),
        method.describe()
    );
    Ok(corrected)
}

/// Mean of the finite values in a window. An all-NaN window yields NaN,
/// which propagates through the correction rather than erroring.
fn window_mean(window: &[f64]) -> f64 {
    let finite: Vec<f64> = window.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.iter().sum::<f64>() / finite.len() as f64
}

/// Degree-1 least-squares fit through `(x, y)` points, returning
/// `(slope, intercept)`. Non-finite values are excluded from the fit;
/// fewer than two finite points yield a NaN line.
fn fit_line(points: &[(f64, f64)]) -> (f64, f64) {
    let finite: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|(_, y)| y.is_finite())
        .collect();
    if finite.len() < 2 {
        return (f64::NAN, f64::NAN);
    }

    let n = finite.len() as f64;
    let mean_x = finite.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = finite.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for (x, y) in &finite {
        num += (x - mean_x) * (y - mean_y);
        den += (x - mean_x) * (x - mean_x);
    }
    if den.abs() < f64::EPSILON {
        // All fit points share one x; no line is defined.
        return (f64::NAN, f64::NAN);
    }
    let slope = num / den;
    (slope, mean_y - slope * mean_x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn three_channel_table() -> Table {
        // 20 rows, 3 numeric channels plus a text column.
        let mut s1 = Vec::new();
        let mut s2 = Vec::new();
        let mut s3 = Vec::new();
        for i in 0..20 {
            s1.push(10.0 + i as f64);
            s2.push(2.0 * i as f64 + 1.0);
            s3.push(5.0 - 0.1 * i as f64);
        }
        Table::from_numeric_columns(vec![
            ("s1".into(), s1),
            ("s2".into(), s2),
            ("s3".into(), s3),
        ])
    }

    #[test]
    fn constant_ratio_divides_by_window_mean() {
        let raw = three_channel_table();
        let spec = CalibrationSpec::Constant {
            start: 0,
            end: 5,
            method: CalibrationMethod::Ratio,
        };
        let corrected = calibrate(&raw, &spec).unwrap();

        for (name, values) in raw.numeric_channels() {
            let baseline: f64 = values[0..5].iter().sum::<f64>() / 5.0;
            let out = corrected.column(name).unwrap().numeric().unwrap();
            assert_eq!(out[0], values[0] / baseline);

            // The corrected window itself averages to 1.0.
            let window_avg: f64 = out[0..5].iter().sum::<f64>() / 5.0;
            assert_relative_eq!(window_avg, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn constant_inverse_ratio_matches_formula() {
        let raw = Table::from_numeric_columns(vec![("s1".into(), vec![2.0, 2.0, 8.0, 1.0])]);
        let spec = CalibrationSpec::Constant {
            start: 0,
            end: 2,
            method: CalibrationMethod::InverseRatio,
        };
        let corrected = calibrate(&raw, &spec).unwrap();
        let out = corrected.column("s1").unwrap().numeric().unwrap();

        // Baseline = mean(2, 2) = 2; corrected = 1 - v/2.
        assert_relative_eq!(out[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(out[2], -3.0, epsilon = 1e-12);
        assert_relative_eq!(out[3], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn constant_rejects_bad_window() {
        let raw = three_channel_table();
        for (start, end) in [(5, 5), (7, 3), (0, 21)] {
            let spec = CalibrationSpec::Constant {
                start,
                end,
                method: CalibrationMethod::Difference,
            };
            assert!(matches!(
                calibrate(&raw, &spec),
                Err(NoseError::InvalidRange { .. })
            ));
        }
    }

    #[test]
    fn linear_difference_cancels_exact_drift() {
        // Channel s2 is exactly linear, so the fitted baseline equals the
        // signal and the difference correction yields zero everywhere.
        let raw = three_channel_table();
        let spec = CalibrationSpec::Linear {
            indices: [0usize, 4, 9, 19].into_iter().collect(),
            method: CalibrationMethod::Difference,
        };
        let corrected = calibrate(&raw, &spec).unwrap();
        let out = corrected.column("s2").unwrap().numeric().unwrap();
        for v in out {
            assert_relative_eq!(*v, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn linear_fit_matches_best_fit_line_at_chosen_indices() {
        let raw = three_channel_table();
        let indices: BTreeSet<usize> = [2usize, 8, 15].into_iter().collect();
        let spec = CalibrationSpec::Linear {
            indices: indices.clone(),
            method: CalibrationMethod::Ratio,
        };
        let corrected = calibrate(&raw, &spec).unwrap();

        let values = raw.column("s3").unwrap().numeric().unwrap();
        let points: Vec<(f64, f64)> = indices.iter().map(|&i| (i as f64, values[i])).collect();
        let (slope, intercept) = fit_line(&points);

        let out = corrected.column("s3").unwrap().numeric().unwrap();
        for &i in &indices {
            let baseline = slope * i as f64 + intercept;
            assert_relative_eq!(out[i], values[i] / baseline, epsilon = 1e-12);
        }
    }

    #[test]
    fn linear_requires_two_in_range_points() {
        let raw = three_channel_table();
        let spec = CalibrationSpec::Linear {
            indices: [3usize, 40, 55].into_iter().collect(),
            method: CalibrationMethod::Ratio,
        };
        assert!(matches!(
            calibrate(&raw, &spec),
            Err(NoseError::InsufficientPoints { needed: 2, got: 1 })
        ));
    }

    #[test]
    fn near_zero_baseline_is_clamped_for_dividing_methods() {
        let raw = Table::from_numeric_columns(vec![("s1".into(), vec![0.0, 0.0, 3.0])]);
        let spec = CalibrationSpec::Constant {
            start: 0,
            end: 2,
            method: CalibrationMethod::Ratio,
        };
        let corrected = calibrate(&raw, &spec).unwrap();
        let out = corrected.column("s1").unwrap().numeric().unwrap();
        // Baseline clamps to +1e-9 rather than dividing by zero.
        assert_eq!(out[2], 3.0 / 1e-9);
    }

    #[test]
    fn difference_method_skips_clamp() {
        let raw = Table::from_numeric_columns(vec![("s1".into(), vec![0.0, 0.0, 3.0])]);
        let spec = CalibrationSpec::Constant {
            start: 0,
            end: 2,
            method: CalibrationMethod::Difference,
        };
        let corrected = calibrate(&raw, &spec).unwrap();
        let out = corrected.column("s1").unwrap().numeric().unwrap();
        assert_eq!(out[2], 3.0);
    }

    #[test]
    fn none_spec_returns_raw() {
        let raw = three_channel_table();
        let corrected = calibrate(&raw, &CalibrationSpec::None).unwrap();
        assert_eq!(corrected, raw);
    }

    #[test]
    fn nan_cells_are_skipped_in_window_mean() {
        let raw = Table::from_numeric_columns(vec![(
            "s1".into(),
            vec![2.0, f64::NAN, 4.0, 10.0],
        )]);
        let spec = CalibrationSpec::Constant {
            start: 0,
            end: 3,
            method: CalibrationMethod::Ratio,
        };
        let corrected = calibrate(&raw, &spec).unwrap();
        let out = corrected.column("s1").unwrap().numeric().unwrap();
        // Mean of {2, 4} = 3.
        assert_relative_eq!(out[3], 10.0 / 3.0, epsilon = 1e-12);
    }
}
