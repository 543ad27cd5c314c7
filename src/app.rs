//! The action protocol: every user-visible operation as a typed action
//! applied to [`AppState`], plus the serializable views derived from it.
//!
//! Actions never panic and never abort the session. Recoverable
//! failures (bad calibration window, empty selection, unknown file)
//! come back as a status line in the [`ActionOutput`] with the state
//! left as it was.

use serde::Serialize;

use crate::analysis::svm::{fit_boundary, BoundaryParams, DecisionSurface, Kernel};
use crate::analysis::{project, scaling::Scaling};
use crate::calibrate::{CalibrationMethod, CalibrationSpec};
use crate::color::ClassColorMap;
use crate::data::model::Table;
use crate::error::NoseError;
use crate::export;
use crate::labels::LabelRow;
use crate::state::{AppState, InteractionMode};

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// One uploaded file: its name and the parse outcome. Parsing happens
/// at the edge (loader or adapter) so a malformed file never aborts the
/// rest of the batch.
#[derive(Debug)]
pub struct FileUpload {
    pub name: String,
    pub table: std::result::Result<Table, String>,
}

/// Everything a user can do, as data.
#[derive(Debug)]
pub enum Action {
    UploadFiles(Vec<FileUpload>),
    SelectActiveFile(String),
    ApplyConstantCalibration {
        start: usize,
        end: usize,
        method: CalibrationMethod,
    },
    /// Fit a drift line through the currently selected baseline points.
    ApplyLinearCalibration { method: CalibrationMethod },
    ResetCalibration,
    ClearBaselinePoints,
    ToggleMode(InteractionMode),
    ClickPoint(usize),
    CommitLabel(String),
    ClearSelection,
    ClearAllLabels,
    RequestProjection { scaling: Scaling, dims: usize },
    RequestBoundary(BoundaryParams),
    RequestExport,
}

/// Per-file outcome of an upload batch.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub added: Vec<String>,
    /// `(name, reason)` for every file that was not ingested.
    pub skipped: Vec<(String, String)>,
}

/// What an applied action reports back to the adapter.
#[derive(Debug, Clone)]
pub struct ActionOutput {
    pub ok: bool,
    pub status: String,
    pub upload_report: Option<UploadReport>,
    /// CSV text produced by `RequestExport`.
    pub export_csv: Option<String>,
}

impl ActionOutput {
    fn ok(status: impl Into<String>) -> Self {
        ActionOutput {
            ok: true,
            status: status.into(),
            upload_report: None,
            export_csv: None,
        }
    }

    fn error(err: NoseError) -> Self {
        ActionOutput {
            ok: false,
            status: err.to_string(),
            upload_report: None,
            export_csv: None,
        }
    }
}

// ---------------------------------------------------------------------------
// The app
// ---------------------------------------------------------------------------

/// Owns the session state and applies actions to it.
#[derive(Debug, Default)]
pub struct App {
    pub state: AppState,
    revision: u64,
}

impl App {
    /// Apply one action. Never fails; recoverable errors become the
    /// output's status line.
    pub fn apply(&mut self, action: Action) -> ActionOutput {
        self.revision += 1;
        match self.try_apply(action) {
            Ok(output) => output,
            Err(err) => {
                log::warn!("Action failed: {err}");
                ActionOutput::error(err)
            }
        }
    }

    /// Monotonic counter bumped once per applied action, whether or not
    /// it succeeded. Adapters use it to invalidate cached views.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn try_apply(&mut self, action: Action) -> crate::Result<ActionOutput> {
        match action {
            Action::UploadFiles(files) => Ok(self.upload(files)),
            Action::SelectActiveFile(name) => {
                self.state.select_active(&name)?;
                Ok(ActionOutput::ok(format!("Active dataset: {name}")))
            }
            Action::ApplyConstantCalibration { start, end, method } => {
                let spec = CalibrationSpec::Constant { start, end, method };
                self.state.apply_calibration(spec)?;
                Ok(ActionOutput::ok(self.state.calibration.status()))
            }
            Action::ApplyLinearCalibration { method } => {
                let spec = CalibrationSpec::Linear {
                    indices: self.state.baseline_points.clone(),
                    method,
                };
                self.state.apply_calibration(spec)?;
                Ok(ActionOutput::ok(self.state.calibration.status()))
            }
            Action::ResetCalibration => {
                self.state.reset_calibration()?;
                Ok(ActionOutput::ok("Calibration reset; showing raw data"))
            }
            Action::ClearBaselinePoints => {
                self.state.clear_baseline_points();
                Ok(ActionOutput::ok("Baseline points cleared"))
            }
            Action::ToggleMode(target) => {
                self.state.toggle_mode(target);
                Ok(ActionOutput::ok(format!(
                    "Mode: {}",
                    self.state.mode.describe()
                )))
            }
            Action::ClickPoint(index) => {
                self.state.click(index);
                Ok(ActionOutput::ok(match self.state.mode {
                    InteractionMode::Labeling => self.state.labels.pending_summary(),
                    InteractionMode::BaselineSelection => {
                        format!("{} baseline points selected", self.state.baseline_points.len())
                    }
                    InteractionMode::Idle => String::new(),
                }))
            }
            Action::CommitLabel(label) => {
                let count = self.state.labels.commit(&label)?;
                Ok(ActionOutput::ok(format!(
                    "Labeled {count} points as '{}'",
                    label.trim()
                )))
            }
            Action::ClearSelection => {
                self.state.labels.clear_selection();
                Ok(ActionOutput::ok("Selection cleared"))
            }
            Action::ClearAllLabels => {
                self.state.labels.clear_all();
                self.state.projection = None;
                self.state.surface = None;
                Ok(ActionOutput::ok("All labels cleared"))
            }
            Action::RequestProjection { scaling, dims } => {
                let projection = project(self.state.labels.samples(), scaling, dims)?;
                let status = format!(
                    "Projected {} samples to {dims}D ({} classes)",
                    projection.points.len(),
                    projection.classes.len()
                );
                self.state.projection = Some(projection);
                // The old surface belongs to the old projection.
                self.state.surface = None;
                Ok(ActionOutput::ok(status))
            }
            Action::RequestBoundary(params) => {
                let projection = self
                    .state
                    .projection
                    .as_ref()
                    .ok_or(NoseError::NoProjection)?;
                let surface = fit_boundary(projection, &params)?;
                let status = surface.describe();
                self.state.surface = Some(surface);
                Ok(ActionOutput::ok(status))
            }
            Action::RequestExport => {
                let projection = self
                    .state
                    .projection
                    .as_ref()
                    .ok_or(NoseError::NoProjection)?;
                let csv = export::projection_to_csv(projection)?;
                let mut output =
                    ActionOutput::ok(format!("Exported {} rows", projection.points.len()));
                output.export_csv = Some(csv);
                Ok(output)
            }
        }
    }

    /// Ingest an upload batch. Unparseable files and duplicate names are
    /// skipped with a reason; when the batch adds at least one new
    /// dataset, the first added one becomes active (with the full
    /// switch reset).
    fn upload(&mut self, files: Vec<FileUpload>) -> ActionOutput {
        let mut report = UploadReport {
            added: Vec::new(),
            skipped: Vec::new(),
        };

        for file in files {
            match file.table {
                Err(reason) => report.skipped.push((file.name, reason)),
                Ok(table) => match self.state.store.ingest(&file.name, table) {
                    Ok(()) => report.added.push(file.name),
                    Err(err) => report.skipped.push((file.name, err.to_string())),
                },
            }
        }

        if let Some(first) = report.added.first().cloned() {
            // select_active cannot fail on a name we just ingested.
            let _ = self.state.select_active(&first);
        }

        let status = format!(
            "Uploaded {} file(s), skipped {}",
            report.added.len(),
            report.skipped.len()
        );
        let mut output = ActionOutput::ok(status);
        output.upload_report = Some(report);
        output
    }
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub rows: usize,
    pub channels: usize,
    pub calibrated: bool,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreSnapshot {
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelSeries {
    pub name: String,
    pub values: Vec<f64>,
}

/// The active dataset's corrected channels plus every row marking the
/// adapter should draw.
#[derive(Debug, Clone, Serialize)]
pub struct TimeseriesView {
    pub name: String,
    pub channels: Vec<ChannelSeries>,
    pub pending: Vec<usize>,
    pub baseline_points: Vec<usize>,
    pub labeled: Vec<usize>,
    pub calibration_status: String,
    pub mode: String,
}

/// Mode plus both partial selections, for adapter display.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionSnapshot {
    pub mode: String,
    pub pending: Vec<usize>,
    pub baseline_points: Vec<usize>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PointView {
    pub coords: Vec<f64>,
    pub label: String,
    pub color: String,
    pub source: String,
    pub index: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum SurfaceView {
    Regions {
        xs: Vec<f64>,
        ys: Vec<f64>,
        class_idx: Vec<Vec<usize>>,
        classes: Vec<String>,
        colors: Vec<String>,
    },
    Plane {
        xs: Vec<f64>,
        ys: Vec<f64>,
        zs: Vec<Vec<f64>>,
    },
    Skipped {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectionView {
    pub axis_labels: Vec<String>,
    pub points: Vec<PointView>,
    pub legend: Vec<(String, String)>,
    pub surface: Option<SurfaceView>,
}

impl App {
    pub fn store_snapshot(&self) -> StoreSnapshot {
        let active = self.state.store.active_name();
        StoreSnapshot {
            files: self
                .state
                .store
                .names()
                .iter()
                .filter_map(|name| self.state.store.get(name))
                .map(|dataset| FileEntry {
                    name: dataset.name.clone(),
                    rows: dataset.raw.n_rows(),
                    channels: dataset.raw.numeric_channel_names().len(),
                    calibrated: dataset.is_calibrated(),
                    active: Some(dataset.name.as_str()) == active,
                })
                .collect(),
        }
    }

    pub fn label_snapshot(&self) -> Vec<LabelRow> {
        self.state.labels.snapshot()
    }

    pub fn selection_snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            mode: self.state.mode.describe().to_string(),
            pending: self.state.labels.pending().iter().map(|p| p.index).collect(),
            baseline_points: self.state.baseline_points.iter().copied().collect(),
            summary: self.state.labels.pending_summary(),
        }
    }

    /// Whether a boundary request could succeed right now, without
    /// attempting the fit.
    pub fn boundary_readiness(&self) -> String {
        match &self.state.projection {
            None => "Generate a projection before fitting a boundary".to_string(),
            Some(projection) if projection.classes.len() < 2 => format!(
                "Decision boundary needs at least 2 distinct labels, got {}",
                projection.classes.len()
            ),
            Some(projection) => format!(
                "Ready: {} samples, {} classes",
                projection.points.len(),
                projection.classes.len()
            ),
        }
    }

    /// Corrected time series of the active dataset, or `None` when no
    /// dataset is active.
    pub fn timeseries_view(&self) -> Option<TimeseriesView> {
        let dataset = self.state.store.active()?;
        let labeled = self
            .state
            .labels
            .samples()
            .iter()
            .filter(|s| s.source == dataset.name)
            .map(|s| s.index)
            .collect();

        Some(TimeseriesView {
            name: dataset.name.clone(),
            channels: dataset
                .corrected
                .numeric_channels()
                .map(|(name, values)| ChannelSeries {
                    name: name.to_string(),
                    values: values.to_vec(),
                })
                .collect(),
            pending: self.state.labels.pending().iter().map(|p| p.index).collect(),
            baseline_points: self.state.baseline_points.iter().copied().collect(),
            labeled,
            calibration_status: self.state.calibration.status(),
            mode: self.state.mode.describe().to_string(),
        })
    }

    /// The latest projection with class colours and the fitted surface,
    /// or `None` when no projection has been requested yet.
    pub fn projection_view(&self) -> Option<ProjectionView> {
        let projection = self.state.projection.as_ref()?;
        let color_map = ClassColorMap::new(&projection.classes);

        let points = projection
            .points
            .iter()
            .map(|p| PointView {
                coords: p.coords.clone(),
                label: p.label.clone(),
                color: color_map.color_for(&p.label).to_string(),
                source: p.source.clone(),
                index: p.index,
            })
            .collect();

        let surface = self.state.surface.as_ref().map(|s| match s {
            DecisionSurface::Regions2D {
                grid,
                classes,
                colors,
            } => SurfaceView::Regions {
                xs: grid.xs.clone(),
                ys: grid.ys.clone(),
                class_idx: grid.class_idx.clone(),
                classes: classes.clone(),
                colors: colors.clone(),
            },
            DecisionSurface::Plane3D { grid } => SurfaceView::Plane {
                xs: grid.xs.clone(),
                ys: grid.ys.clone(),
                zs: grid.zs.clone(),
            },
            DecisionSurface::Skipped { reason } => SurfaceView::Skipped {
                reason: reason.clone(),
            },
        });

        Some(ProjectionView {
            axis_labels: projection.axis_labels(),
            points,
            legend: color_map.legend_entries(),
            surface,
        })
    }
}

/// Hint shown next to the boundary controls before a request is made:
/// in 3D, only a linear kernel with exactly two classes gets a surface.
pub fn boundary_advisory(dims: usize, kernel: Kernel, n_classes: usize) -> Option<String> {
    if dims == 3 && (kernel != Kernel::Linear || n_classes != 2) {
        Some(
            "3D decision surfaces are only drawn for a linear kernel with exactly 2 classes"
                .to_string(),
        )
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, rows: usize) -> FileUpload {
        let s1 = (0..rows).map(|i| 10.0 + i as f64).collect();
        let s2 = (0..rows).map(|i| 5.0 - 0.1 * i as f64).collect();
        FileUpload {
            name: name.to_string(),
            table: Ok(Table::from_numeric_columns(vec![
                ("s1".into(), s1),
                ("s2".into(), s2),
            ])),
        }
    }

    #[test]
    fn upload_activates_first_file_and_reports_skips() {
        let mut app = App::default();
        let output = app.apply(Action::UploadFiles(vec![
            upload("run1.csv", 10),
            FileUpload {
                name: "broken.csv".to_string(),
                table: Err("missing header".to_string()),
            },
            upload("run1.csv", 5),
        ]));

        assert!(output.ok);
        let report = output.upload_report.unwrap();
        assert_eq!(report.added, vec!["run1.csv"]);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(app.state.store.active_name(), Some("run1.csv"));
    }

    #[test]
    fn failed_action_reports_without_mutating() {
        let mut app = App::default();
        app.apply(Action::UploadFiles(vec![upload("run1.csv", 10)]));

        let output = app.apply(Action::ApplyConstantCalibration {
            start: 8,
            end: 4,
            method: CalibrationMethod::Ratio,
        });
        assert!(!output.ok);
        assert!(output.status.contains("window"));
        assert!(!app.state.store.active().unwrap().is_calibrated());
    }

    #[test]
    fn revision_bumps_on_every_action() {
        let mut app = App::default();
        assert_eq!(app.revision(), 0);
        app.apply(Action::ClearSelection);
        app.apply(Action::RequestExport); // fails: no projection
        assert_eq!(app.revision(), 2);
    }

    #[test]
    fn full_label_project_export_flow() {
        let mut app = App::default();
        app.apply(Action::UploadFiles(vec![upload("run1.csv", 20)]));
        app.apply(Action::ToggleMode(InteractionMode::Labeling));
        for i in [0usize, 1, 2] {
            assert!(app.apply(Action::ClickPoint(i)).ok);
        }
        assert!(app.apply(Action::CommitLabel("air".to_string())).ok);
        for i in [15usize, 16, 17] {
            app.apply(Action::ClickPoint(i));
        }
        assert!(app.apply(Action::CommitLabel("coffee".to_string())).ok);

        let output = app.apply(Action::RequestProjection {
            scaling: Scaling::Standardize,
            dims: 2,
        });
        assert!(output.ok, "{}", output.status);

        let output = app.apply(Action::RequestExport);
        assert!(output.ok);
        let csv = output.export_csv.unwrap();
        assert!(csv.starts_with("original_index,label,source_file,PC1,PC2"));
        assert_eq!(csv.lines().count(), 7);

        let view = app.projection_view().unwrap();
        assert_eq!(view.points.len(), 6);
        assert_eq!(view.legend.len(), 2);
        assert!(view.surface.is_none());
    }

    #[test]
    fn boundary_requires_a_projection() {
        let mut app = App::default();
        let output = app.apply(Action::RequestBoundary(BoundaryParams::default()));
        assert!(!output.ok);
    }

    #[test]
    fn linear_calibration_uses_selected_baseline_points() {
        let mut app = App::default();
        app.apply(Action::UploadFiles(vec![upload("run1.csv", 20)]));
        app.apply(Action::ToggleMode(InteractionMode::BaselineSelection));
        app.apply(Action::ClickPoint(0));
        app.apply(Action::ClickPoint(19));

        let output = app.apply(Action::ApplyLinearCalibration {
            method: CalibrationMethod::Difference,
        });
        assert!(output.ok, "{}", output.status);

        // s1 is exactly linear, so the difference correction zeroes it.
        let view = app.timeseries_view().unwrap();
        let s1 = &view.channels[0];
        assert!(s1.values.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn selection_snapshot_and_readiness_track_state() {
        let mut app = App::default();
        assert!(app.boundary_readiness().contains("projection"));

        app.apply(Action::UploadFiles(vec![upload("run1.csv", 20)]));
        app.apply(Action::ToggleMode(InteractionMode::Labeling));
        app.apply(Action::ClickPoint(2));
        app.apply(Action::ClickPoint(5));

        let snapshot = app.selection_snapshot();
        assert_eq!(snapshot.mode, "labeling");
        assert_eq!(snapshot.pending, vec![2, 5]);
        assert!(snapshot.baseline_points.is_empty());

        app.apply(Action::CommitLabel("air".to_string()));
        for i in 10..12 {
            app.apply(Action::ClickPoint(i));
        }
        app.apply(Action::CommitLabel("coffee".to_string()));
        app.apply(Action::RequestProjection {
            scaling: Scaling::Standardize,
            dims: 2,
        });
        assert!(app.boundary_readiness().starts_with("Ready"));
    }

    #[test]
    fn advisory_flags_unsupported_3d_combinations() {
        assert!(boundary_advisory(3, Kernel::Rbf, 2).is_some());
        assert!(boundary_advisory(3, Kernel::Linear, 3).is_some());
        assert!(boundary_advisory(3, Kernel::Linear, 2).is_none());
        assert!(boundary_advisory(2, Kernel::Polynomial, 5).is_none());
    }
}
