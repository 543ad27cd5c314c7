//! Labeled samples and the pending selection buffer.
//!
//! While the user is in labeling mode, clicked points accumulate in a
//! transient per-dataset buffer; committing stamps them all with one
//! label and appends them to the global label set. Labeled samples are
//! immutable and outlive the dataset they came from.

use serde::Serialize;

use crate::error::{NoseError, Result};

/// One committed observation: the corrected channel values at a clicked
/// row, stamped with a user label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    pub label: String,
    pub features: Vec<f64>,
    pub source: String,
    pub index: usize,
}

/// A clicked-but-uncommitted point.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPoint {
    pub index: usize,
    pub features: Vec<f64>,
}

/// Row of the label-table snapshot shown by the adapter.
#[derive(Debug, Clone, Serialize)]
pub struct LabelRow {
    pub label: String,
    pub source: String,
    pub index: usize,
    pub dim: usize,
}

/// The global, append-only label set plus the transient selection buffer.
#[derive(Debug, Clone, Default)]
pub struct LabelSet {
    samples: Vec<LabeledSample>,
    pending: Vec<PendingPoint>,
    pending_source: Option<String>,
}

impl LabelSet {
    /// Buffer a clicked point. The pending buffer is per-dataset: a
    /// point from a different dataset restarts the buffer. A repeated
    /// index is reported as `DuplicateIndex` (callers treat it as a
    /// no-op click).
    pub fn add_point(&mut self, index: usize, features: Vec<f64>, source: &str) -> Result<()> {
        if self.pending_source.as_deref() != Some(source) {
            self.pending.clear();
            self.pending_source = Some(source.to_string());
        }
        if self.pending.iter().any(|p| p.index == index) {
            return Err(NoseError::DuplicateIndex { index });
        }
        self.pending.push(PendingPoint { index, features });
        Ok(())
    }

    /// Commit the pending selection under `label`, appending one sample
    /// per buffered point. Returns how many samples were appended.
    pub fn commit(&mut self, label: &str) -> Result<usize> {
        let label = label.trim();
        if label.is_empty() {
            return Err(NoseError::EmptyLabel);
        }
        if self.pending.is_empty() {
            return Err(NoseError::EmptySelection);
        }
        let source = self.pending_source.take().unwrap_or_default();
        let count = self.pending.len();
        for point in self.pending.drain(..) {
            self.samples.push(LabeledSample {
                label: label.to_string(),
                features: point.features,
                source: source.clone(),
                index: point.index,
            });
        }
        log::info!("Committed {count} samples under label '{label}'");
        Ok(count)
    }

    pub fn clear_selection(&mut self) {
        self.pending.clear();
        self.pending_source = None;
    }

    pub fn clear_all(&mut self) {
        self.samples.clear();
        self.clear_selection();
    }

    pub fn samples(&self) -> &[LabeledSample] {
        &self.samples
    }

    pub fn pending(&self) -> &[PendingPoint] {
        &self.pending
    }

    pub fn pending_source(&self) -> Option<&str> {
        self.pending_source.as_deref()
    }

    pub fn is_pending(&self, index: usize) -> bool {
        self.pending.iter().any(|p| p.index == index)
    }

    /// Distinct labels across all committed samples, sorted ascending.
    /// This is the class order used by the projection engine.
    pub fn distinct_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.samples.iter().map(|s| s.label.clone()).collect();
        labels.sort();
        labels.dedup();
        labels
    }

    /// Snapshot rows for adapter display.
    pub fn snapshot(&self) -> Vec<LabelRow> {
        self.samples
            .iter()
            .map(|s| LabelRow {
                label: s.label.clone(),
                source: s.source.clone(),
                index: s.index,
                dim: s.features.len(),
            })
            .collect()
    }

    /// One-line progress text while a selection is being built.
    pub fn pending_summary(&self) -> String {
        match self.pending.len() {
            0 => "Click points on the time series to select them".to_string(),
            n => format!("{n} points selected for labeling"),
        }
    }
}
