//! Variance-maximizing linear projection.
//!
//! Eigendecomposition runs on the feature covariance through nalgebra's
//! `SymmetricEigen`, in f64 for numerical headroom, and the projection onto
//! the leading eigenvectors comes back as `f32` features.

use nalgebra::{DMatrix, SymmetricEigen};

use spike_sort_core::FeatureMatrix;

use crate::error::{ClusterError, ClusterResult};

/// A fitted projection: feature mean and the leading principal axes.
#[derive(Debug, Clone)]
pub struct Pca {
    mean: Vec<f64>,
    /// One row per retained component, each of input dimensionality.
    components: Vec<Vec<f64>>,
}

impl Pca {
    /// Fit a projection with up to `n_components` axes. The retained count
    /// is capped by both the input dimensionality and the sample count.
    pub fn fit(data: &FeatureMatrix, n_components: usize) -> ClusterResult<Self> {
        let n = data.n_spikes();
        let d = data.n_features();
        if n < 2 {
            return Err(ClusterError::EmptyInput(
                "at least two rows are required to fit a projection",
            ));
        }

        let mut mean = vec![0.0f64; d];
        for row in data.rows() {
            for (m, &v) in mean.iter_mut().zip(row) {
                *m += f64::from(v);
            }
        }
        for m in &mut mean {
            *m /= n as f64;
        }

        // covariance of the centred data
        let mut cov = DMatrix::<f64>::zeros(d, d);
        for row in data.rows() {
            let centred: Vec<f64> = row
                .iter()
                .zip(&mean)
                .map(|(&v, &m)| f64::from(v) - m)
                .collect();
            for r in 0..d {
                for c in r..d {
                    cov[(r, c)] += centred[r] * centred[c];
                }
            }
        }
        let norm = (n - 1) as f64;
        for r in 0..d {
            for c in r..d {
                let v = cov[(r, c)] / norm;
                cov[(r, c)] = v;
                cov[(c, r)] = v;
            }
        }

        let eigen = SymmetricEigen::new(cov);
        let mut order: Vec<usize> = (0..d).collect();
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[b]
                .partial_cmp(&eigen.eigenvalues[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let keep = n_components.min(d).min(n - 1).max(1);
        let components = order
            .into_iter()
            .take(keep)
            .map(|k| eigen.eigenvectors.column(k).iter().copied().collect())
            .collect();

        Ok(Self { mean, components })
    }

    /// Number of retained axes.
    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    /// Project rows onto the retained axes.
    ///
    /// # Errors
    /// `DimensionMismatch` (via the core type) if the row width differs
    /// from the fitted dimensionality.
    pub fn transform(&self, data: &FeatureMatrix) -> ClusterResult<FeatureMatrix> {
        if data.n_features() != self.mean.len() {
            return Err(ClusterError::Core(
                spike_sort_core::CoreError::DimensionMismatch {
                    expected: self.mean.len(),
                    actual: data.n_features(),
                },
            ));
        }
        let mut values = Vec::with_capacity(data.n_spikes() * self.components.len());
        for row in data.rows() {
            let centred: Vec<f64> = row
                .iter()
                .zip(&self.mean)
                .map(|(&v, &m)| f64::from(v) - m)
                .collect();
            for axis in &self.components {
                let score: f64 = axis.iter().zip(&centred).map(|(&a, &c)| a * c).sum();
                values.push(score as f32);
            }
        }
        Ok(FeatureMatrix::new(values, self.components.len())?)
    }
}

/// Fit and project in one step.
pub fn project(data: &FeatureMatrix, n_components: usize) -> ClusterResult<FeatureMatrix> {
    Pca::fit(data, n_components)?.transform(data)
}
