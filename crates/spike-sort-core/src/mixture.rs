//! Component-indexed mixture parameters.
//!
//! All arrays share the component axis and are mutated in lockstep. Slicing
//! with [`MixtureState::gather`] copies into a new aggregate; nothing ever
//! aliases the parent's storage.

use crate::error::{CoreError, CoreResult};

/// Parameters of one fitted mixture: per-component mean, covariance factor
/// and its inverse, degrees of freedom, precision scale and mixing
/// pseudo-count.
///
/// Covariance factors are `dim * dim` row-major buffers. The effective
/// precision of component `k` is `cov_factor(k)` scaled by `dof(k)`.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureState {
    dim: usize,
    means: Vec<Vec<f32>>,
    cov_factors: Vec<Vec<f32>>,
    inv_cov_factors: Vec<Vec<f32>>,
    dof: Vec<f32>,
    precision_scale: Vec<f32>,
    pseudo_count: Vec<f32>,
}

impl MixtureState {
    /// A state with zero components over a `dim`-dimensional feature space.
    pub fn empty(dim: usize) -> Self {
        Self {
            dim,
            means: Vec::new(),
            cov_factors: Vec::new(),
            inv_cov_factors: Vec::new(),
            dof: Vec::new(),
            precision_scale: Vec::new(),
            pseudo_count: Vec::new(),
        }
    }

    /// Feature dimensionality.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of components.
    pub fn n_components(&self) -> usize {
        self.means.len()
    }

    /// Whether the state holds no components.
    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    /// Append one component, validating shapes against `dim`.
    pub fn push_component(
        &mut self,
        mean: Vec<f32>,
        cov_factor: Vec<f32>,
        inv_cov_factor: Vec<f32>,
        dof: f32,
        precision_scale: f32,
        pseudo_count: f32,
    ) -> CoreResult<()> {
        if mean.len() != self.dim {
            return Err(CoreError::DimensionMismatch {
                expected: self.dim,
                actual: mean.len(),
            });
        }
        let sq = self.dim * self.dim;
        if cov_factor.len() != sq {
            return Err(CoreError::length_mismatch("cov factor", cov_factor.len(), sq));
        }
        if inv_cov_factor.len() != sq {
            return Err(CoreError::length_mismatch(
                "inverse cov factor",
                inv_cov_factor.len(),
                sq,
            ));
        }
        self.means.push(mean);
        self.cov_factors.push(cov_factor);
        self.inv_cov_factors.push(inv_cov_factor);
        self.dof.push(dof);
        self.precision_scale.push(precision_scale);
        self.pseudo_count.push(pseudo_count);
        Ok(())
    }

    /// Mean of component `k`.
    pub fn mean(&self, k: usize) -> &[f32] {
        &self.means[k]
    }

    /// Covariance factor of component `k`, `dim * dim` row-major.
    pub fn cov_factor(&self, k: usize) -> &[f32] {
        &self.cov_factors[k]
    }

    /// Inverse covariance factor of component `k`.
    pub fn inv_cov_factor(&self, k: usize) -> &[f32] {
        &self.inv_cov_factors[k]
    }

    /// Degrees of freedom of component `k`.
    pub fn dof(&self, k: usize) -> f32 {
        self.dof[k]
    }

    /// Precision scale of component `k`.
    pub fn precision_scale(&self, k: usize) -> f32 {
        self.precision_scale[k]
    }

    /// Mixing pseudo-count of component `k`.
    pub fn pseudo_count(&self, k: usize) -> f32 {
        self.pseudo_count[k]
    }

    /// Copy the selected components, in the given order, into a new state.
    pub fn gather(&self, components: &[usize]) -> Self {
        let mut out = Self::empty(self.dim);
        for &k in components {
            out.means.push(self.means[k].clone());
            out.cov_factors.push(self.cov_factors[k].clone());
            out.inv_cov_factors.push(self.inv_cov_factors[k].clone());
            out.dof.push(self.dof[k]);
            out.precision_scale.push(self.precision_scale[k]);
            out.pseudo_count.push(self.pseudo_count[k]);
        }
        out
    }

    /// Delete component `k` from every parallel array.
    pub fn delete_component(&mut self, k: usize) {
        self.means.remove(k);
        self.cov_factors.remove(k);
        self.inv_cov_factors.remove(k);
        self.dof.remove(k);
        self.precision_scale.remove(k);
        self.pseudo_count.remove(k);
    }

    /// Overwrite component `k` with component `src` of another state.
    ///
    /// # Errors
    /// `DimensionMismatch` if the two states disagree on dimensionality.
    pub fn replace_component(&mut self, k: usize, other: &MixtureState, src: usize) -> CoreResult<()> {
        if other.dim != self.dim {
            return Err(CoreError::DimensionMismatch {
                expected: self.dim,
                actual: other.dim,
            });
        }
        self.means[k] = other.means[src].clone();
        self.cov_factors[k] = other.cov_factors[src].clone();
        self.inv_cov_factors[k] = other.inv_cov_factors[src].clone();
        self.dof[k] = other.dof[src];
        self.precision_scale[k] = other.precision_scale[src];
        self.pseudo_count[k] = other.pseudo_count[src];
        Ok(())
    }

    /// Concatenate another state's components along the component axis.
    ///
    /// # Errors
    /// `DimensionMismatch` if the two states disagree on dimensionality.
    pub fn concat(&mut self, other: MixtureState) -> CoreResult<()> {
        if other.dim != self.dim {
            return Err(CoreError::DimensionMismatch {
                expected: self.dim,
                actual: other.dim,
            });
        }
        self.means.extend(other.means);
        self.cov_factors.extend(other.cov_factors);
        self.inv_cov_factors.extend(other.inv_cov_factors);
        self.dof.extend(other.dof);
        self.precision_scale.extend(other.precision_scale);
        self.pseudo_count.extend(other.pseudo_count);
        Ok(())
    }

    /// Whether every parameter of every component is finite.
    pub fn is_finite(&self) -> bool {
        let vecs_finite = self
            .means
            .iter()
            .chain(self.cov_factors.iter())
            .chain(self.inv_cov_factors.iter())
            .all(|v| v.iter().all(|x| x.is_finite()));
        let scalars_finite = self
            .dof
            .iter()
            .chain(self.precision_scale.iter())
            .chain(self.pseudo_count.iter())
            .all(|x| x.is_finite());
        vecs_finite && scalars_finite
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(dim: usize) -> Vec<f32> {
        let mut m = vec![0.0; dim * dim];
        for i in 0..dim {
            m[i * dim + i] = 1.0;
        }
        m
    }

    fn state_with(means: &[Vec<f32>]) -> MixtureState {
        let dim = means[0].len();
        let mut state = MixtureState::empty(dim);
        for mean in means {
            state
                .push_component(mean.clone(), identity(dim), identity(dim), 1.0, 1.0, 1.0)
                .unwrap();
        }
        state
    }

    #[test]
    fn test_push_validates_shapes() {
        let mut state = MixtureState::empty(2);
        assert!(state
            .push_component(vec![0.0; 3], identity(2), identity(2), 1.0, 1.0, 1.0)
            .is_err());
        assert!(state
            .push_component(vec![0.0; 2], vec![0.0; 3], identity(2), 1.0, 1.0, 1.0)
            .is_err());
        assert!(state
            .push_component(vec![0.0; 2], identity(2), identity(2), 1.0, 1.0, 1.0)
            .is_ok());
    }

    #[test]
    fn test_gather_copies_in_order() {
        let state = state_with(&[vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0]]);
        let sub = state.gather(&[2, 0]);
        assert_eq!(sub.n_components(), 2);
        assert_eq!(sub.mean(0), &[2.0, 2.0]);
        assert_eq!(sub.mean(1), &[0.0, 0.0]);
        // parent untouched
        assert_eq!(state.n_components(), 3);
    }

    #[test]
    fn test_delete_keeps_arrays_in_lockstep() {
        let mut state = state_with(&[vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0]]);
        state.delete_component(1);
        assert_eq!(state.n_components(), 2);
        assert_eq!(state.mean(1), &[2.0, 2.0]);
        assert_eq!(state.dof.len(), 2);
        assert_eq!(state.pseudo_count.len(), 2);
    }

    #[test]
    fn test_replace_component() {
        let mut state = state_with(&[vec![0.0, 0.0], vec![1.0, 1.0]]);
        let merged = state_with(&[vec![0.5, 0.5]]);
        state.replace_component(0, &merged, 0).unwrap();
        assert_eq!(state.mean(0), &[0.5, 0.5]);
    }

    #[test]
    fn test_concat_checks_dim() {
        let mut state = state_with(&[vec![0.0, 0.0]]);
        let other = state_with(&[vec![1.0, 1.0], vec![2.0, 2.0]]);
        state.concat(other).unwrap();
        assert_eq!(state.n_components(), 3);

        let narrow = state_with(&[vec![1.0]]);
        assert!(state.concat(narrow).is_err());
    }

    #[test]
    fn test_is_finite() {
        let mut state = state_with(&[vec![0.0, 0.0]]);
        assert!(state.is_finite());
        state
            .push_component(vec![f32::NAN, 0.0], identity(2), identity(2), 1.0, 1.0, 1.0)
            .unwrap();
        assert!(!state.is_finite());
    }
}
