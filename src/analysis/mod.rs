//! Analysis layer: scaling → PCA projection → SVM decision surface.
//!
//! ```text
//!   LabeledSample[]
//!        │  scale per channel (standardize | min-max)
//!        ▼
//!   ┌──────────┐
//!   │   pca     │  top-2/3 principal axes, explained variance
//!   └──────────┘
//!        │  projected coordinates + class labels
//!        ▼
//!   ┌──────────┐
//!   │   svm     │  one-vs-one SVC, 2D region raster / 3D plane
//!   └──────────┘
//! ```
pub mod pca;
pub mod scaling;
pub mod svm;

use ndarray::Array2;

use crate::error::{NoseError, Result};
use crate::labels::LabeledSample;
use pca::PcaModel;
use scaling::Scaling;

/// One projected sample with its plotting metadata.
#[derive(Debug, Clone)]
pub struct ProjectedPoint {
    pub coords: Vec<f64>,
    pub label: String,
    pub source: String,
    pub index: usize,
}

/// Result of projecting the label set into principal-component space.
#[derive(Debug, Clone)]
pub struct Projection {
    /// Samples × dims projected coordinates.
    pub coords: Array2<f64>,
    pub dims: usize,
    pub explained_variance_ratio: Vec<f64>,
    pub points: Vec<ProjectedPoint>,
    /// Distinct labels sorted ascending; class index = rank here.
    pub classes: Vec<String>,
}

impl Projection {
    /// Class index of a label, by rank in the sorted class list.
    pub fn class_index(&self, label: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == label)
    }

    /// Encoded class index per sample, in sample order.
    pub fn encoded_classes(&self) -> Vec<usize> {
        self.points
            .iter()
            .map(|p| self.class_index(&p.label).unwrap_or(0))
            .collect()
    }

    /// Axis captions of the form `PC1 (62.5%)`.
    pub fn axis_labels(&self) -> Vec<String> {
        self.explained_variance_ratio
            .iter()
            .enumerate()
            .map(|(i, ratio)| format!("PC{} ({:.1}%)", i + 1, ratio * 100.0))
            .collect()
    }
}

/// Scale the labeled feature vectors per channel and project them onto
/// the top `dims` principal components.
///
/// Preconditions: all feature vectors share one length
/// (`DimensionMismatch` otherwise) and there are at least `dims` samples
/// (`InsufficientSamples`). A `dims` larger than the channel count
/// clamps to the channel count; the returned projection reports the
/// clamped dimensionality.
pub fn project(samples: &[LabeledSample], scaling: Scaling, dims: usize) -> Result<Projection> {
    if samples.len() < dims {
        return Err(NoseError::InsufficientSamples {
            dims,
            got: samples.len(),
        });
    }

    let expected = samples[0].features.len();
    for sample in samples {
        if sample.features.len() != expected {
            return Err(NoseError::DimensionMismatch {
                expected,
                got: sample.features.len(),
            });
        }
    }

    let mut data = Array2::zeros((samples.len(), expected));
    for (i, sample) in samples.iter().enumerate() {
        for (j, &v) in sample.features.iter().enumerate() {
            data[[i, j]] = v;
        }
    }

    let scaled = scaling::scale(&data, scaling);
    let model = PcaModel::fit(&scaled, dims);
    let coords = model.transform(&scaled);

    // Fitting clamps the component count to the channel count; report
    // the dimensionality the projection actually has so surface fitting
    // and export see real columns.
    if coords.ncols() < dims {
        log::warn!(
            "Only {expected} channels available; projecting to {}D instead of {dims}D",
            coords.ncols()
        );
    }
    let dims = coords.ncols();

    let points = samples
        .iter()
        .enumerate()
        .map(|(i, sample)| ProjectedPoint {
            coords: coords.row(i).to_vec(),
            label: sample.label.clone(),
            source: sample.source.clone(),
            index: sample.index,
        })
        .collect();

    let mut classes: Vec<String> = samples.iter().map(|s| s.label.clone()).collect();
    classes.sort();
    classes.dedup();

    log::info!(
        "Projected {} samples to {}D (EVR: {:?})",
        samples.len(),
        dims,
        model.explained_variance_ratio
    );

    Ok(Projection {
        coords,
        dims,
        explained_variance_ratio: model.explained_variance_ratio,
        points,
        classes,
    })
}
