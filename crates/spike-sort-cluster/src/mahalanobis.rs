//! Directional squared Mahalanobis distances between component means.
//!
//! The distance from component `i` to component `j` weights the mean
//! difference by component `i`'s effective precision (covariance factor
//! scaled by degrees of freedom). The two directions generally disagree and
//! both are kept; this asymmetry is part of the merge semantics, not an
//! approximation to be fixed. The diagonal is permanently infinite, and a
//! rejected pair's entries are set infinite and never reset.

use spike_sort_core::MixtureState;

/// Symmetric-shaped, directionally computed squared distance matrix.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    values: Vec<f32>,
    n: usize,
}

/// Quadratic form `d' P d` with `P` a `dim * dim` row-major matrix.
fn quadratic_form(prec: &[f32], d: &[f32]) -> f64 {
    let dim = d.len();
    let mut total = 0.0f64;
    for r in 0..dim {
        let mut row_dot = 0.0f64;
        for c in 0..dim {
            row_dot += f64::from(prec[r * dim + c]) * f64::from(d[c]);
        }
        total += f64::from(d[r]) * row_dot;
    }
    total
}

/// Squared Mahalanobis distance of `j`'s mean from `i`'s mean under `i`'s
/// effective precision.
pub fn squared_distance(state: &MixtureState, i: usize, j: usize) -> f32 {
    let dim = state.dim();
    let mut diff = vec![0.0f32; dim];
    for (d, (&a, &b)) in diff.iter_mut().zip(state.mean(i).iter().zip(state.mean(j))) {
        *d = a - b;
    }
    let dof = f64::from(state.dof(i));
    let prec: Vec<f32> = state
        .cov_factor(i)
        .iter()
        .map(|&v| (f64::from(v) * dof) as f32)
        .collect();
    quadratic_form(&prec, &diff) as f32
}

impl DistanceMatrix {
    /// Compute all pairwise directional distances for the given state.
    /// Diagonal entries are infinite.
    pub fn compute(state: &MixtureState) -> Self {
        let n = state.n_components();
        let mut matrix = Self {
            values: vec![f32::INFINITY; n * n],
            n,
        };
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    matrix.set(i, j, squared_distance(state, i, j));
                }
            }
        }
        matrix
    }

    /// Number of components covered.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Distance from `i` to `j`.
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.values[i * self.n + j]
    }

    fn set(&mut self, i: usize, j: usize, value: f32) {
        self.values[i * self.n + j] = value;
    }

    /// Delete row and column `k`, shrinking the matrix by one.
    pub fn remove(&mut self, k: usize) {
        let n = self.n;
        let mut values = Vec::with_capacity((n - 1) * (n - 1));
        for i in 0..n {
            if i == k {
                continue;
            }
            for j in 0..n {
                if j == k {
                    continue;
                }
                values.push(self.get(i, j));
            }
        }
        self.values = values;
        self.n = n - 1;
    }

    /// Recompute row and column `k` against the current state, leaving the
    /// self-distance infinite. Used after a merge replaces component `k`.
    pub fn refresh_component(&mut self, state: &MixtureState, k: usize) {
        for j in 0..self.n {
            if j == k {
                continue;
            }
            self.set(k, j, squared_distance(state, k, j));
            self.set(j, k, squared_distance(state, j, k));
        }
        self.set(k, k, f32::INFINITY);
    }

    /// Permanently mark the pair as rejected: both directions become
    /// infinite and are never reconsidered.
    pub fn mark_rejected(&mut self, i: usize, j: usize) {
        self.set(i, j, f32::INFINITY);
        self.set(j, i, f32::INFINITY);
    }

    /// Ascending component ids whose distance to `k`, in either direction,
    /// falls below the gate.
    pub fn gated_neighbors(&self, k: usize, gate: f32) -> Vec<usize> {
        (0..self.n)
            .filter(|&j| j != k && (self.get(k, j) < gate || self.get(j, k) < gate))
            .collect()
    }

    /// Lowest component id that still has a gated candidate, if any.
    pub fn first_gated_anchor(&self, gate: f32) -> Option<usize> {
        (0..self.n).find(|&i| !self.gated_neighbors(i, gate).is_empty())
    }
}
