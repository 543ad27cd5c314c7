//! Session state and the click-interaction state machine.
//!
//! Clicks on the time series mean different things depending on the
//! current mode: in `Labeling` they grow the pending selection, in
//! `BaselineSelection` they pick baseline fit points, and in `Idle`
//! they are ignored. Entering or leaving either mode discards both
//! kinds of partial selection.

use std::collections::BTreeSet;

use crate::analysis::svm::DecisionSurface;
use crate::analysis::Projection;
use crate::calibrate::{self, CalibrationSpec};
use crate::data::model::DatasetStore;
use crate::error::{NoseError, Result};
use crate::labels::LabelSet;

/// What a click on a data point currently does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    #[default]
    Idle,
    Labeling,
    BaselineSelection,
}

impl InteractionMode {
    pub fn describe(self) -> &'static str {
        match self {
            InteractionMode::Idle => "idle",
            InteractionMode::Labeling => "labeling",
            InteractionMode::BaselineSelection => "baseline selection",
        }
    }
}

/// Everything one analysis session owns: the uploaded datasets, the
/// active calibration, partial selections, committed labels, and the
/// latest analysis results.
///
/// Projection and surface results are snapshots; they go stale silently
/// when labels change and are replaced on the next request.
#[derive(Debug, Default)]
pub struct AppState {
    pub store: DatasetStore,
    pub calibration: CalibrationSpec,
    pub baseline_points: BTreeSet<usize>,
    pub labels: LabelSet,
    pub mode: InteractionMode,
    pub projection: Option<Projection>,
    pub surface: Option<DecisionSurface>,
}

impl AppState {
    /// Switch the active dataset. Calibration, baseline points and the
    /// pending selection are all scoped to the active dataset, so a
    /// switch resets them; committed labels survive.
    pub fn select_active(&mut self, name: &str) -> Result<()> {
        self.store.set_active(name)?;
        self.calibration = CalibrationSpec::None;
        if let Some(dataset) = self.store.active_mut() {
            dataset.reset_corrected();
        }
        self.baseline_points.clear();
        self.labels.clear_selection();
        log::info!("Active dataset: {name}");
        Ok(())
    }

    /// Toggle `target` on or off. Any mode change discards the pending
    /// selection and the baseline points.
    pub fn toggle_mode(&mut self, target: InteractionMode) {
        self.mode = if self.mode == target {
            InteractionMode::Idle
        } else {
            target
        };
        self.labels.clear_selection();
        self.baseline_points.clear();
        log::debug!("Interaction mode: {}", self.mode.describe());
    }

    /// Route a click on row `index` of the active dataset according to
    /// the current mode. Stray clicks (no active dataset, out-of-range
    /// index, idle mode, re-click of a selected point) are ignored.
    pub fn click(&mut self, index: usize) {
        let Some(dataset) = self.store.active() else {
            log::debug!("Click with no active dataset; ignoring");
            return;
        };
        if index >= dataset.corrected.n_rows() {
            log::debug!("Click at out-of-range row {index}; ignoring");
            return;
        }

        match self.mode {
            InteractionMode::Idle => {}
            InteractionMode::Labeling => {
                let Some(features) = dataset.corrected.feature_vector_at(index) else {
                    return;
                };
                let source = dataset.name.clone();
                if let Err(NoseError::DuplicateIndex { index }) =
                    self.labels.add_point(index, features, &source)
                {
                    log::debug!("Point {index} already selected; ignoring");
                }
            }
            InteractionMode::BaselineSelection => {
                // BTreeSet deduplicates repeated clicks.
                self.baseline_points.insert(index);
            }
        }
    }

    /// Apply `spec` to the active dataset, replacing its corrected
    /// table. On failure the previous correction stays in place.
    pub fn apply_calibration(&mut self, spec: CalibrationSpec) -> Result<()> {
        let dataset = self.store.active_mut().ok_or(NoseError::NoActiveDataset)?;
        let corrected = calibrate::calibrate(&dataset.raw, &spec)?;
        dataset.corrected = corrected;
        self.calibration = spec;
        Ok(())
    }

    /// Drop the active calibration and show raw data again.
    pub fn reset_calibration(&mut self) -> Result<()> {
        let dataset = self.store.active_mut().ok_or(NoseError::NoActiveDataset)?;
        dataset.reset_corrected();
        self.calibration = CalibrationSpec::None;
        Ok(())
    }

    pub fn clear_baseline_points(&mut self) {
        self.baseline_points.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibrate::CalibrationMethod;
    use crate::data::model::Table;

    fn state_with_one_dataset() -> AppState {
        let mut state = AppState::default();
        let table = Table::from_numeric_columns(vec![
            ("s1".into(), (0..10).map(|i| 10.0 + i as f64).collect()),
            ("s2".into(), (0..10).map(|i| 2.0 * i as f64).collect()),
        ]);
        state.store.ingest("run1.csv", table).unwrap();
        state.select_active("run1.csv").unwrap();
        state
    }

    #[test]
    fn idle_clicks_are_ignored() {
        let mut state = state_with_one_dataset();
        state.click(3);
        assert!(state.labels.pending().is_empty());
        assert!(state.baseline_points.is_empty());
    }

    #[test]
    fn labeling_clicks_buffer_corrected_features() {
        let mut state = state_with_one_dataset();
        state
            .apply_calibration(CalibrationSpec::Constant {
                start: 0,
                end: 2,
                method: CalibrationMethod::Difference,
            })
            .unwrap();
        state.toggle_mode(InteractionMode::Labeling);
        state.click(0);

        let pending = state.labels.pending();
        assert_eq!(pending.len(), 1);
        // Features come from the corrected table: 10.0 - mean(10.0, 11.0).
        assert_eq!(pending[0].features[0], -0.5);
    }

    #[test]
    fn repeated_labeling_click_is_a_noop() {
        let mut state = state_with_one_dataset();
        state.toggle_mode(InteractionMode::Labeling);
        state.click(4);
        state.click(4);
        assert_eq!(state.labels.pending().len(), 1);
    }

    #[test]
    fn baseline_clicks_accumulate_deduplicated() {
        let mut state = state_with_one_dataset();
        state.toggle_mode(InteractionMode::BaselineSelection);
        state.click(2);
        state.click(7);
        state.click(2);
        assert_eq!(state.baseline_points.len(), 2);
    }

    #[test]
    fn out_of_range_click_is_ignored() {
        let mut state = state_with_one_dataset();
        state.toggle_mode(InteractionMode::Labeling);
        state.click(10);
        assert!(state.labels.pending().is_empty());
    }

    #[test]
    fn click_without_active_dataset_is_ignored() {
        let mut state = AppState::default();
        state.click(0);
        assert!(state.labels.pending().is_empty());
    }

    #[test]
    fn mode_toggle_clears_partial_selections() {
        let mut state = state_with_one_dataset();
        state.toggle_mode(InteractionMode::Labeling);
        state.click(1);
        state.toggle_mode(InteractionMode::BaselineSelection);
        assert!(state.labels.pending().is_empty());
        state.click(3);

        // Toggling the same mode off also clears.
        state.toggle_mode(InteractionMode::BaselineSelection);
        assert_eq!(state.mode, InteractionMode::Idle);
        assert!(state.baseline_points.is_empty());
    }

    #[test]
    fn dataset_switch_resets_per_dataset_state_but_keeps_labels() {
        let mut state = state_with_one_dataset();
        let table = Table::from_numeric_columns(vec![("s1".into(), vec![1.0, 2.0, 3.0])]);
        state.store.ingest("run2.csv", table).unwrap();

        state
            .apply_calibration(CalibrationSpec::Constant {
                start: 0,
                end: 2,
                method: CalibrationMethod::Ratio,
            })
            .unwrap();
        state.toggle_mode(InteractionMode::Labeling);
        state.click(0);
        state.labels.commit("apple").unwrap();
        state.click(1);
        state.toggle_mode(InteractionMode::Idle);
        state.toggle_mode(InteractionMode::BaselineSelection);
        state.click(5);

        state.select_active("run2.csv").unwrap();
        assert!(state.calibration.is_none());
        assert!(state.baseline_points.is_empty());
        assert!(state.labels.pending().is_empty());
        assert_eq!(state.labels.samples().len(), 1);
        assert!(!state.store.get("run2.csv").unwrap().is_calibrated());
    }

    #[test]
    fn failed_calibration_leaves_previous_correction() {
        let mut state = state_with_one_dataset();
        state
            .apply_calibration(CalibrationSpec::Constant {
                start: 0,
                end: 2,
                method: CalibrationMethod::Ratio,
            })
            .unwrap();
        let before = state.store.active().unwrap().corrected.clone();

        let err = state.apply_calibration(CalibrationSpec::Constant {
            start: 5,
            end: 5,
            method: CalibrationMethod::Ratio,
        });
        assert!(err.is_err());
        assert_eq!(state.store.active().unwrap().corrected, before);
        assert!(!state.calibration.is_none());
    }

    #[test]
    fn reset_calibration_restores_raw() {
        let mut state = state_with_one_dataset();
        state
            .apply_calibration(CalibrationSpec::Constant {
                start: 0,
                end: 3,
                method: CalibrationMethod::InverseRatio,
            })
            .unwrap();
        assert!(state.store.active().unwrap().is_calibrated());

        state.reset_calibration().unwrap();
        assert!(!state.store.active().unwrap().is_calibrated());
        assert!(state.calibration.is_none());
    }
}
