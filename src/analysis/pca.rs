//! Principal component analysis via power iteration.
//!
//! The sample sets here are small (user-clicked points), so the dominant
//! eigenpairs of the covariance matrix are found with plain power
//! iteration plus deflation; no LAPACK backend is needed.

use ndarray::{Array1, Array2, Axis};

/// A fitted PCA model: the top `dims` principal axes of the (scaled)
/// sample matrix and how much variance each explains.
#[derive(Debug, Clone)]
pub struct PcaModel {
    /// Channels × dims; columns are unit-length principal axes in
    /// descending eigenvalue order.
    pub components: Array2<f64>,
    /// Per-component eigenvalue / total covariance trace. Each lies in
    /// `[0, 1]` and the retained ratios sum to at most 1.
    pub explained_variance_ratio: Vec<f64>,
    /// Channel means used for centering.
    pub mean: Array1<f64>,
}

impl PcaModel {
    /// Fit the top `dims` components of a samples × channels matrix.
    pub fn fit(data: &Array2<f64>, dims: usize) -> Self {
        let n_features = data.ncols();
        let dims = dims.min(n_features);

        // A matrix with no rows has no principal axes.
        let Some(mean) = data.mean_axis(Axis(0)) else {
            return PcaModel {
                components: Array2::zeros((n_features, 0)),
                explained_variance_ratio: Vec::new(),
                mean: Array1::zeros(n_features),
            };
        };
        let cov = covariance(data, &mean);

        let total_variance: f64 = (0..n_features).map(|i| cov[[i, i]]).sum();
        let (eigenvalues, eigenvectors) = dominant_eigenpairs(&cov, dims);

        let explained_variance_ratio = eigenvalues
            .iter()
            .map(|&ev| {
                if total_variance > 1e-12 {
                    (ev / total_variance).clamp(0.0, 1.0)
                } else {
                    0.0
                }
            })
            .collect();

        PcaModel {
            components: eigenvectors,
            explained_variance_ratio,
            mean,
        }
    }

    /// Project a samples × channels matrix onto the principal axes.
    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        let centered = data - &self.mean;
        centered.dot(&self.components)
    }
}

/// Sample covariance (ddof = 1) of centered data.
fn covariance(data: &Array2<f64>, mean: &Array1<f64>) -> Array2<f64> {
    let n = data.nrows() as f64;
    let centered = data - mean;
    centered.t().dot(&centered) / (n - 1.0).max(1.0)
}

/// Top-`k` eigenpairs of a symmetric matrix via power iteration with
/// deflation. Returns eigenvalues (descending) and the eigenvectors as
/// matrix columns.
fn dominant_eigenpairs(matrix: &Array2<f64>, k: usize) -> (Vec<f64>, Array2<f64>) {
    let n = matrix.nrows();
    let k = k.min(n);
    let mut eigenvalues = Vec::with_capacity(k);
    let mut eigenvectors = Array2::zeros((n, k));
    let mut deflated = matrix.clone();

    for col in 0..k {
        let (eigenvalue, eigenvector) = power_iteration(&deflated, 300, 1e-12);
        eigenvalues.push(eigenvalue);
        for row in 0..n {
            eigenvectors[[row, col]] = eigenvector[row];
        }

        // Deflate: A <- A - λ v vᵀ
        for i in 0..n {
            for j in 0..n {
                deflated[[i, j]] -= eigenvalue * eigenvector[i] * eigenvector[j];
            }
        }
    }

    (eigenvalues, eigenvectors)
}

/// Largest eigenvalue and eigenvector of a symmetric matrix.
fn power_iteration(matrix: &Array2<f64>, max_iter: usize, tol: f64) -> (f64, Array1<f64>) {
    let n = matrix.nrows();
    let mut v = Array1::from_elem(n, 1.0 / (n as f64).sqrt());
    let mut eigenvalue = 0.0;

    for _ in 0..max_iter {
        let mut new_v = matrix.dot(&v);

        // Rayleigh quotient on the unit vector v.
        let new_eigenvalue: f64 = v.dot(&new_v);

        let norm = new_v.dot(&new_v).sqrt();
        if norm > 1e-12 {
            new_v /= norm;
        } else {
            // Matrix annihilates v; remaining spectrum is ~zero.
            return (0.0, v);
        }

        if (new_eigenvalue - eigenvalue).abs() < tol {
            return (new_eigenvalue, new_v);
        }
        eigenvalue = new_eigenvalue;
        v = new_v;
    }

    (eigenvalue, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::array;

    #[test]
    fn recovers_dominant_axis_of_stretched_cloud() {
        // Points spread along the x axis with slight y jitter.
        let data = array![
            [-4.0, 0.1],
            [-2.0, -0.1],
            [0.0, 0.05],
            [2.0, -0.05],
            [4.0, 0.0]
        ];
        let pca = PcaModel::fit(&data, 2);

        // First component is (±1, ~0).
        assert_relative_eq!(pca.components[[0, 0]].abs(), 1.0, epsilon = 1e-2);
        assert!(pca.components[[1, 0]].abs() < 0.1);
        assert!(pca.explained_variance_ratio[0] > 0.99);
    }

    #[test]
    fn variance_ratios_are_bounded() {
        let data = array![
            [1.0, 2.0, 3.0, 1.0],
            [2.0, 1.0, 4.0, 2.0],
            [3.0, 5.0, 2.0, 0.0],
            [4.0, 3.0, 1.0, 3.0],
            [5.0, 4.0, 5.0, 1.0],
            [6.0, 6.0, 6.0, 2.0]
        ];
        let pca = PcaModel::fit(&data, 2);
        let sum: f64 = pca.explained_variance_ratio.iter().sum();
        assert!(sum <= 1.0 + 1e-9);
        for &r in &pca.explained_variance_ratio {
            assert!((0.0..=1.0).contains(&r));
        }
        // Descending order.
        assert!(pca.explained_variance_ratio[0] >= pca.explained_variance_ratio[1]);
    }

    #[test]
    fn transform_centers_the_data() {
        let data = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0], [7.0, 8.0]];
        let pca = PcaModel::fit(&data, 2);
        let projected = pca.transform(&data);

        // Projected cloud is centered on the origin.
        let mean = projected.mean_axis(Axis(0)).unwrap();
        assert_abs_diff_eq!(mean[0], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(mean[1], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn empty_matrix_yields_an_empty_model() {
        let data = Array2::<f64>::zeros((0, 3));
        let pca = PcaModel::fit(&data, 2);
        assert_eq!(pca.components.dim(), (3, 0));
        assert!(pca.explained_variance_ratio.is_empty());
        assert_eq!(pca.transform(&data).dim(), (0, 0));
    }

    #[test]
    fn components_are_orthonormal() {
        let data = array![
            [1.0, 0.5, 0.2],
            [2.0, 1.1, 0.3],
            [3.0, 1.4, 0.9],
            [4.0, 2.2, 0.1],
            [5.0, 2.4, 0.7]
        ];
        let pca = PcaModel::fit(&data, 2);
        let c0 = pca.components.column(0);
        let c1 = pca.components.column(1);
        assert_relative_eq!(c0.dot(&c0), 1.0, epsilon = 1e-6);
        assert_relative_eq!(c1.dot(&c1), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(c0.dot(&c1), 0.0, epsilon = 1e-6);
    }
}
