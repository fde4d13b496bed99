//! Places songs on a plane so similar feature vectors end up close together.
//!
//! Columns are standardized, reduced to two principal components, and the
//! resulting points are pushed radially into an annulus. Angles survive the
//! radial rescale, so relative direction between songs is preserved.

use faer::{Mat, Side};
use ndarray::{Array1, Array2, Axis};
use tracing::debug;

use crate::types::{LayoutConfig, LayoutPoint};

const DEGENERATE: f64 = 1e-12;

/// Zero-mean, unit-variance columns (population variance). Columns with no
/// spread are divided by 1 instead of 0.
pub fn standardize(features: &Array2<f64>) -> Array2<f64> {
    let n = features.nrows();
    if n == 0 {
        return features.clone();
    }
    let mean = features
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(features.ncols()));
    let std = features.std_axis(Axis(0), 0.0).mapv(|s| {
        if s.is_finite() && s > DEGENERATE {
            s
        } else {
            1.0
        }
    });
    (features - &mean) / &std
}

/// Eigenvalues and column eigenvectors of a symmetric matrix.
pub fn symmetric_eigen(matrix: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = matrix.nrows();
    let m = Mat::<f64>::from_fn(n, n, |i, j| matrix[(i, j)]);
    let evd = m.selfadjoint_eigendecomposition(Side::Lower);

    let s = evd.s().column_vector();
    let u = evd.u();
    let values = Array1::from_shape_fn(n, |i| s.read(i));
    let vectors = Array2::from_shape_fn((n, n), |(i, j)| u.read(i, j));
    (values, vectors)
}

/// Projects rows onto the two directions of largest variance. Each component
/// is sign-fixed so its largest loading is positive, which keeps layouts
/// stable between runs. Always returns `N x 2`.
pub fn pca_2d(standardized: &Array2<f64>) -> Array2<f64> {
    let (n, d) = standardized.dim();
    if n == 0 || d == 0 {
        return Array2::zeros((n, 2));
    }

    let cov = standardized.t().dot(standardized) / n as f64;
    let (eigenvalues, eigenvectors) = symmetric_eigen(&cov);

    let mut order: Vec<usize> = (0..d).collect();
    order.sort_by(|&i, &j| eigenvalues[j].total_cmp(&eigenvalues[i]));

    let mut components = Array2::<f64>::zeros((d, 2));
    for (slot, &idx) in order.iter().take(2).enumerate() {
        let mut col = eigenvectors.column(idx).to_owned();
        let pivot = col
            .iter()
            .cloned()
            .fold(0.0f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
        if pivot < 0.0 {
            col.mapv_inplace(|x| -x);
        }
        components.column_mut(slot).assign(&col);
    }
    debug!(
        explained = ?order.iter().take(2).map(|&i| eigenvalues[i]).collect::<Vec<_>>(),
        "pca components"
    );

    standardized.dot(&components)
}

/// Maps each point's radius linearly from the batch's `[min, max]` radius to
/// `[min_distance, max_distance]`, keeping its angle. When every radius is the
/// same the normalized radius is 0, so points sit on the inner ring.
pub fn rescale_to_annulus(points: &Array2<f64>, cfg: &LayoutConfig) -> Vec<LayoutPoint> {
    let polar: Vec<(f64, f64)> = points
        .axis_iter(Axis(0))
        .map(|p| {
            let (x, y) = (p[0], p[1]);
            (x.hypot(y), y.atan2(x))
        })
        .collect();

    let min_r = polar.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let max_r = polar.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let span = max_r - min_r;

    polar
        .into_iter()
        .map(|(r, theta)| {
            let norm = if span > DEGENERATE {
                (r - min_r) / span
            } else {
                0.0
            };
            let radius = cfg.min_distance + norm * (cfg.max_distance - cfg.min_distance);
            LayoutPoint {
                x: radius * theta.cos(),
                z: radius * theta.sin(),
            }
        })
        .collect()
}

/// Full layout for an `N x F` feature matrix, one point per row in row order.
pub fn layout(features: &Array2<f64>, cfg: &LayoutConfig) -> Vec<LayoutPoint> {
    if features.nrows() == 0 {
        return Vec::new();
    }
    let standardized = standardize(features);
    let projected = pca_2d(&standardized);
    rescale_to_annulus(&projected, cfg)
}
