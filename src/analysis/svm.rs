//! Support-vector decision surfaces over the projected space.
//!
//! Classifiers are trained with linfa's SVM on the 2D/3D projected
//! coordinates. Multiclass fits use one-vs-one pairwise machines with
//! majority voting. For visualization the 2D case rasterizes predicted
//! classes over a fine grid; the 3D case draws the separating plane of
//! a linear two-class fit and silently skips everything else.
//!
//! Decision functions are evaluated from the recovered dual weights:
//! - Linear: `f(x) = w·x - rho` with `w = Σ αᵢ xᵢ`
//! - RBF:    `f(x) = Σ αᵢ exp(-γ‖x-xᵢ‖²) - rho`
//! - Poly:   `f(x) = Σ αᵢ (γ x·xᵢ)ᵈ - rho` (inputs pre-scaled by √γ)

use std::str::FromStr;

use linfa::prelude::*;
use linfa_svm::Svm;
use ndarray::{Array1, Array2, ArrayView1};

use crate::analysis::Projection;
use crate::color::generate_palette;
use crate::error::{NoseError, Result};

/// Raster step of the 2D decision-region grid.
const GRID_STEP_2D: f64 = 0.05;
/// Raster step of the 3D separating-plane grid.
const GRID_STEP_3D: f64 = 0.5;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Kernel of the support-vector classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    Linear,
    Rbf,
    Polynomial,
}

impl Kernel {
    pub fn describe(self) -> &'static str {
        match self {
            Kernel::Linear => "linear",
            Kernel::Rbf => "RBF",
            Kernel::Polynomial => "polynomial",
        }
    }
}

/// Kernel width policy. `Scale` and `Auto` mirror the common estimator
/// conventions: `1 / (dims · var(X))` and `1 / dims` respectively.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GammaSetting {
    Scale,
    Auto,
    Value(f64),
}

impl GammaSetting {
    /// Resolve to a concrete positive value for the given training data.
    pub fn resolve(self, records: &Array2<f64>) -> f64 {
        let dims = records.ncols().max(1) as f64;
        match self {
            GammaSetting::Auto => 1.0 / dims,
            GammaSetting::Value(v) => v,
            GammaSetting::Scale => {
                let n = records.len() as f64;
                let mean = records.iter().sum::<f64>() / n;
                let var = records.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
                if var > 1e-12 {
                    1.0 / (dims * var)
                } else {
                    1.0 / dims
                }
            }
        }
    }
}

impl FromStr for GammaSetting {
    type Err = NoseError;

    /// Numeric input is tried first, then the symbolic policy names.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(v) = s.parse::<f64>() {
            if v > 0.0 && v.is_finite() {
                return Ok(GammaSetting::Value(v));
            }
            return Err(NoseError::InvalidKernelParams {
                reason: format!("gamma must be positive, got {v}"),
            });
        }
        match s.to_ascii_lowercase().as_str() {
            "scale" => Ok(GammaSetting::Scale),
            "auto" => Ok(GammaSetting::Auto),
            other => Err(NoseError::InvalidKernelParams {
                reason: format!("gamma must be a positive number, 'scale' or 'auto', got '{other}'"),
            }),
        }
    }
}

/// User-facing classifier parameters for a boundary request.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryParams {
    pub kernel: Kernel,
    pub c: f64,
    pub gamma: GammaSetting,
    pub degree: u32,
}

impl Default for BoundaryParams {
    fn default() -> Self {
        BoundaryParams {
            kernel: Kernel::Rbf,
            c: 1.0,
            gamma: GammaSetting::Scale,
            degree: 3,
        }
    }
}

impl BoundaryParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.c > 0.0 && self.c.is_finite()) {
            return Err(NoseError::InvalidKernelParams {
                reason: format!("C must be positive, got {}", self.c),
            });
        }
        if self.degree == 0 {
            return Err(NoseError::InvalidKernelParams {
                reason: "polynomial degree must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Decision surface output
// ---------------------------------------------------------------------------

/// Predicted classes rasterized over a uniform 2D grid.
#[derive(Debug, Clone)]
pub struct RegionGrid {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    /// `class_idx[yi][xi]` = predicted class index at `(xs[xi], ys[yi])`.
    pub class_idx: Vec<Vec<usize>>,
}

/// The separating plane of a linear two-class fit in 3D, sampled over a
/// coarse grid.
#[derive(Debug, Clone)]
pub struct PlaneGrid {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    /// `zs[yi][xi]` = plane height at `(xs[xi], ys[yi])`.
    pub zs: Vec<Vec<f64>>,
}

/// Result of a boundary request. `Skipped` covers the 3D combinations
/// the tool does not draw; it is a reported no-op, not an error.
#[derive(Debug, Clone)]
pub enum DecisionSurface {
    Regions2D {
        grid: RegionGrid,
        /// Classes in index order, and one colour per class.
        classes: Vec<String>,
        colors: Vec<String>,
    },
    Plane3D { grid: PlaneGrid },
    Skipped { reason: String },
}

impl DecisionSurface {
    pub fn describe(&self) -> String {
        match self {
            DecisionSurface::Regions2D { grid, classes, .. } => format!(
                "2D decision regions: {}x{} grid, {} classes",
                grid.xs.len(),
                grid.ys.len(),
                classes.len()
            ),
            DecisionSurface::Plane3D { grid } => format!(
                "3D separating plane: {}x{} grid",
                grid.xs.len(),
                grid.ys.len()
            ),
            DecisionSurface::Skipped { reason } => format!("Surface skipped: {reason}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Fitting
// ---------------------------------------------------------------------------

/// Fit a support-vector classifier on the projected coordinates and
/// rasterize its decision surface.
///
/// Requires at least two distinct labels. In 3D only the linear-kernel,
/// two-class case yields a surface; every other combination returns
/// `Skipped` without training.
pub fn fit_boundary(projection: &Projection, params: &BoundaryParams) -> Result<DecisionSurface> {
    params.validate()?;

    let n_classes = projection.classes.len();
    if n_classes < 2 {
        return Err(NoseError::TooFewClasses { got: n_classes });
    }

    match projection.dims {
        2 => fit_regions_2d(projection, params),
        3 if params.kernel == Kernel::Linear && n_classes == 2 => {
            fit_plane_3d(projection, params)
        }
        3 => Ok(DecisionSurface::Skipped {
            reason: "3D surfaces are only drawn for a linear kernel with exactly 2 classes"
                .to_string(),
        }),
        other => Ok(DecisionSurface::Skipped {
            reason: format!("no surface rendering for {other}D projections"),
        }),
    }
}

fn fit_regions_2d(projection: &Projection, params: &BoundaryParams) -> Result<DecisionSurface> {
    let model = OneVsOneModel::train(projection, params)?;

    let (x_min, x_max) = axis_span(&projection.coords.column(0));
    let (y_min, y_max) = axis_span(&projection.coords.column(1));
    let xs = grid_steps(x_min, x_max, GRID_STEP_2D);
    let ys = grid_steps(y_min, y_max, GRID_STEP_2D);

    let mut class_idx = Vec::with_capacity(ys.len());
    for &y in &ys {
        let mut row = Vec::with_capacity(xs.len());
        for &x in &xs {
            row.push(model.predict(&Array1::from_vec(vec![x, y])));
        }
        class_idx.push(row);
    }

    log::info!(
        "Rasterized {} decision regions over a {}x{} grid",
        projection.classes.len(),
        xs.len(),
        ys.len()
    );

    Ok(DecisionSurface::Regions2D {
        grid: RegionGrid { xs, ys, class_idx },
        classes: projection.classes.clone(),
        colors: generate_palette(projection.classes.len()),
    })
}

fn fit_plane_3d(projection: &Projection, params: &BoundaryParams) -> Result<DecisionSurface> {
    let encoded = projection.encoded_classes();
    let targets: Vec<bool> = encoded.iter().map(|&c| c == 0).collect();
    let machine = BinaryMachine::train(&projection.coords, &targets, params)?;

    let BinaryKernel::Linear { weights, rho } = &machine.kernel else {
        // fit_boundary only routes linear kernels here.
        return Ok(DecisionSurface::Skipped {
            reason: "3D surfaces require a linear kernel".to_string(),
        });
    };

    if weights[2].abs() < 1e-9 {
        // Plane is vertical in PC3; there is no z = f(x, y) surface.
        log::warn!("Separating plane has ~zero PC3 coefficient; surface skipped");
        return Ok(DecisionSurface::Skipped {
            reason: "separating plane is degenerate along the third axis".to_string(),
        });
    }

    let (x_min, x_max) = axis_span(&projection.coords.column(0));
    let (y_min, y_max) = axis_span(&projection.coords.column(1));
    let xs = grid_steps(x_min, x_max, GRID_STEP_3D);
    let ys = grid_steps(y_min, y_max, GRID_STEP_3D);

    // Solve w·(x, y, z) - rho = 0 for z.
    let zs = ys
        .iter()
        .map(|&y| {
            xs.iter()
                .map(|&x| (rho - weights[0] * x - weights[1] * y) / weights[2])
                .collect()
        })
        .collect();

    Ok(DecisionSurface::Plane3D {
        grid: PlaneGrid { xs, ys, zs },
    })
}

/// `[min - 1, max + 1)` sampled at `step`.
fn grid_steps(min: f64, max: f64, step: f64) -> Vec<f64> {
    let mut steps = Vec::new();
    let mut v = min;
    while v < max {
        steps.push(v);
        v += step;
    }
    steps
}

fn axis_span(column: &ArrayView1<f64>) -> (f64, f64) {
    let min = column.iter().copied().fold(f64::INFINITY, f64::min);
    let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (min - 1.0, max + 1.0)
}

// ---------------------------------------------------------------------------
// One-vs-one reduction over binary linfa machines
// ---------------------------------------------------------------------------

/// A trained binary classifier with its decision function recovered
/// from the dual weights.
struct BinaryMachine {
    kernel: BinaryKernel,
}

enum BinaryKernel {
    Linear {
        weights: Array1<f64>,
        rho: f64,
    },
    Rbf {
        alpha: Vec<f64>,
        support: Array2<f64>,
        rho: f64,
        gamma: f64,
    },
    Poly {
        alpha: Vec<f64>,
        /// Support vectors pre-scaled by sqrt(gamma).
        support: Array2<f64>,
        rho: f64,
        gamma_sqrt: f64,
        degree: f64,
    },
}

impl BinaryMachine {
    /// Train one binary machine on `records` with boolean `targets`.
    fn train(records: &Array2<f64>, targets: &[bool], params: &BoundaryParams) -> Result<Self> {
        let gamma = params.gamma.resolve(records);
        let svm_params = Svm::<f64, bool>::params().pos_neg_weights(params.c, params.c);

        // For the polynomial kernel, gamma enters by scaling inputs:
        // (sqrt(g)x · sqrt(g)y)^d = (g x·y)^d.
        let gamma_sqrt = gamma.sqrt();
        let fit_records = match params.kernel {
            Kernel::Polynomial => records * gamma_sqrt,
            _ => records.clone(),
        };

        let dataset = Dataset::new(fit_records.clone(), Array1::from_vec(targets.to_vec()));
        let fitted = match params.kernel {
            Kernel::Linear => svm_params.linear_kernel().fit(&dataset),
            // linfa's Gaussian kernel is exp(-‖a-b‖² / eps), so eps = 1/γ.
            Kernel::Rbf => svm_params.gaussian_kernel(1.0 / gamma).fit(&dataset),
            Kernel::Polynomial => svm_params
                .polynomial_kernel(0.0, params.degree as f64)
                .fit(&dataset),
        }
        .map_err(|e| NoseError::TrainingFailed {
            reason: e.to_string(),
        })?;

        let alpha = fitted.alpha.clone();
        let rho = fitted.rho;

        let kernel = match params.kernel {
            Kernel::Linear => {
                // w = Σ αᵢ xᵢ
                let mut weights = Array1::zeros(records.ncols());
                for (i, &alpha_i) in alpha.iter().enumerate() {
                    weights = weights + &(fit_records.row(i).to_owned() * alpha_i);
                }
                BinaryKernel::Linear { weights, rho }
            }
            Kernel::Rbf => BinaryKernel::Rbf {
                alpha,
                support: fit_records,
                rho,
                gamma,
            },
            Kernel::Polynomial => BinaryKernel::Poly {
                alpha,
                support: fit_records,
                rho,
                gamma_sqrt,
                degree: params.degree as f64,
            },
        };

        Ok(BinaryMachine { kernel })
    }

    fn decision(&self, x: &Array1<f64>) -> f64 {
        match &self.kernel {
            BinaryKernel::Linear { weights, rho } => weights.dot(x) - rho,
            BinaryKernel::Rbf {
                alpha,
                support,
                rho,
                gamma,
            } => {
                let mut sum = 0.0;
                for (i, alpha_i) in alpha.iter().enumerate() {
                    let diff = &support.row(i) - x;
                    let sq_dist: f64 = diff.iter().map(|d| d * d).sum();
                    sum += alpha_i * (-gamma * sq_dist).exp();
                }
                sum - rho
            }
            BinaryKernel::Poly {
                alpha,
                support,
                rho,
                gamma_sqrt,
                degree,
            } => {
                let scaled = x * *gamma_sqrt;
                let mut sum = 0.0;
                for (i, alpha_i) in alpha.iter().enumerate() {
                    sum += alpha_i * support.row(i).dot(&scaled).powf(*degree);
                }
                sum - rho
            }
        }
    }
}

/// One-vs-one pairwise machines with majority voting. Vote ties resolve
/// to the smaller class index.
struct OneVsOneModel {
    machines: Vec<(usize, usize, BinaryMachine)>,
    n_classes: usize,
}

impl OneVsOneModel {
    fn train(projection: &Projection, params: &BoundaryParams) -> Result<Self> {
        let encoded = projection.encoded_classes();
        let n_classes = projection.classes.len();
        let mut machines = Vec::new();

        for pos in 0..n_classes {
            for neg in (pos + 1)..n_classes {
                let rows: Vec<usize> = encoded
                    .iter()
                    .enumerate()
                    .filter(|(_, &c)| c == pos || c == neg)
                    .map(|(i, _)| i)
                    .collect();

                let mut records = Array2::zeros((rows.len(), projection.dims));
                let mut targets = Vec::with_capacity(rows.len());
                for (out_row, &in_row) in rows.iter().enumerate() {
                    records
                        .row_mut(out_row)
                        .assign(&projection.coords.row(in_row));
                    targets.push(encoded[in_row] == pos);
                }

                let machine = BinaryMachine::train(&records, &targets, params)?;
                machines.push((pos, neg, machine));
            }
        }

        Ok(OneVsOneModel {
            machines,
            n_classes,
        })
    }

    fn predict(&self, x: &Array1<f64>) -> usize {
        let mut votes = vec![0usize; self.n_classes];
        for (pos, neg, machine) in &self.machines {
            if machine.decision(x) > 0.0 {
                votes[*pos] += 1;
            } else {
                votes[*neg] += 1;
            }
        }
        // First maximum wins, so ties go to the smaller class index.
        let mut best = 0;
        for (class, &count) in votes.iter().enumerate() {
            if count > votes[best] {
                best = class;
            }
        }
        best
    }
}
