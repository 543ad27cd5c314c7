//! Per-channel feature scaling applied before the PCA projection.

use ndarray::{Array2, Axis};

/// How feature vectors are rescaled per channel over the sample set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scaling {
    /// Zero mean, unit variance per channel.
    Standardize,
    /// Rescale each channel to `[0, 1]`.
    MinMax,
}

/// Scale a samples × channels matrix. Channels with no spread collapse
/// to zeros under both schemes rather than dividing by zero.
pub fn scale(data: &Array2<f64>, scaling: Scaling) -> Array2<f64> {
    match scaling {
        Scaling::Standardize => standardize(data),
        Scaling::MinMax => min_max(data),
    }
}

fn standardize(data: &Array2<f64>) -> Array2<f64> {
    // No rows means nothing to scale.
    let Some(mean) = data.mean_axis(Axis(0)) else {
        return data.clone();
    };
    let std = data.std_axis(Axis(0), 0.0);

    let mut result = data.clone();
    let (n_rows, n_cols) = data.dim();
    for j in 0..n_cols {
        for i in 0..n_rows {
            result[[i, j]] -= mean[j];
            if std[j] > 1e-12 {
                result[[i, j]] /= std[j];
            }
        }
    }
    result
}

fn min_max(data: &Array2<f64>) -> Array2<f64> {
    let mut result = data.clone();
    let (n_rows, n_cols) = data.dim();
    for j in 0..n_cols {
        let col = data.column(j);
        let min = col.iter().copied().fold(f64::INFINITY, f64::min);
        let max = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        for i in 0..n_rows {
            result[[i, j]] = if range > 1e-12 {
                (result[[i, j]] - min) / range
            } else {
                0.0
            };
        }
    }
    result
}
