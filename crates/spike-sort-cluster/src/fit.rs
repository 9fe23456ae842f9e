//! Contracts of the external variational collaborators.
//!
//! The engine never derives mixture parameters itself. Fitting a mixture to
//! one channel's features and deciding whether a 1-component explanation
//! beats a 2-component one are numerical procedures owned by an external
//! variational model; the engine consumes them through these seams.
//! Sufficient-statistic re-derivation for the merge test also lives behind
//! the seam, since its formulas belong to the same model.

use spike_sort_core::{DenseResponsibilities, FeatureMatrix, MaskGroup, MixtureState};

use crate::config::ClusteringConfig;
use crate::error::{ClusterError, ClusterResult};

/// Result of one mixture fit: component parameters plus the dense
/// responsibility matrix, component- and spike-indexed consistently.
#[derive(Debug, Clone)]
pub struct FittedMixture {
    /// Fitted component parameters.
    pub state: MixtureState,
    /// Responsibilities, one row per input spike.
    pub responsibilities: DenseResponsibilities,
}

impl FittedMixture {
    /// Bundle a state with its responsibilities, checking that both sides
    /// agree on the component count.
    pub fn new(
        state: MixtureState,
        responsibilities: DenseResponsibilities,
    ) -> ClusterResult<Self> {
        if state.n_components() != responsibilities.n_components() {
            return Err(ClusterError::Fit(format!(
                "fitter returned {} components but {} responsibility columns",
                state.n_components(),
                responsibilities.n_components()
            )));
        }
        Ok(Self {
            state,
            responsibilities,
        })
    }
}

/// External mixture-fitting collaborator.
///
/// Implementations fit one mixture to the given features under the given
/// mask/group weighting. Random initialization is the implementation's
/// business; deterministic tests inject a seeded or deterministic fitter.
pub trait MixtureFitter: Send + Sync {
    /// Fit a mixture to `features`.
    ///
    /// # Errors
    /// `ClusterError::Fit` when the fit cannot be produced. The orchestrator
    /// propagates this as a hard failure of the channel fit.
    fn fit(
        &self,
        features: &FeatureMatrix,
        mask_group: &MaskGroup,
        config: &ClusteringConfig,
    ) -> ClusterResult<FittedMixture>;
}

/// Outcome of one pairwise merge test.
#[derive(Debug, Clone)]
pub enum MergeDecision {
    /// The 2-component explanation wins; the pair stays split.
    Rejected,
    /// The 1-component explanation wins. Carries the merged component as a
    /// single-component state.
    Merged(MixtureState),
}

/// External evidence-based merge-test collaborator.
///
/// Given a local 2-component sub-problem (the features of the spikes
/// involved, the two components' parameters and their local
/// responsibilities), the collaborator re-derives its sufficient statistics
/// and compares a 1-component against a 2-component explanation of the
/// evidence.
pub trait MergeTest: Send + Sync {
    /// Decide whether the two components of `state` should merge.
    ///
    /// # Errors
    /// `ClusterError::MergeTest` on failure. The merge engine downgrades
    /// this to a rejection of the attempted merge and continues.
    fn test_merge(
        &self,
        features: &FeatureMatrix,
        state: &MixtureState,
        responsibilities: &DenseResponsibilities,
        config: &ClusteringConfig,
    ) -> ClusterResult<MergeDecision>;
}
