//! Greedy Mahalanobis-gated cluster merging.
//!
//! Consolidation walks anchors in ascending component-id order. Each anchor
//! drains a worklist of gated candidates; an accepted merge collapses the
//! pair onto the lower index, rebuilds the worklist around the survivor and
//! continues from there, while a rejection poisons the pair's distances
//! permanently. The greedy, order-dependent semantics are the design; the
//! deterministic scan order is what makes outcomes reproducible.

use tracing::{debug, warn};

use spike_sort_core::MixtureState;

use crate::aggregate::GlobalClusters;
use crate::config::ClusteringConfig;
use crate::error::ClusterResult;
use crate::fit::{MergeDecision, MergeTest};
use crate::mahalanobis::DistanceMatrix;

/// Counters describing one consolidation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Accepted merges (each decreases the component count by one).
    pub merges: usize,
    /// Rejected pairs (each poisoned permanently).
    pub rejections: usize,
}

/// Greedy pairwise merge engine over one global cluster collection.
pub struct MergeEngine<'a, T: MergeTest> {
    test: &'a T,
    config: &'a ClusteringConfig,
}

impl<'a, T: MergeTest> MergeEngine<'a, T> {
    /// Create a merge engine over the given merge test and configuration.
    pub fn new(test: &'a T, config: &'a ClusteringConfig) -> Self {
        Self { test, config }
    }

    /// Consolidate the collection until no anchor has a gated candidate
    /// left.
    pub fn consolidate(&self, clusters: &mut GlobalClusters) -> ClusterResult<MergeStats> {
        let mut maha = DistanceMatrix::compute(&clusters.state);
        let gate = self.config.merge_distance_gate;
        let mut stats = MergeStats::default();

        while let Some(anchor) = maha.first_gated_anchor(gate) {
            self.merge_move(clusters, &mut maha, anchor, &mut stats)?;
        }
        debug!(
            merges = stats.merges,
            rejections = stats.rejections,
            n_components = clusters.n_components(),
            "merge consolidation finished"
        );
        Ok(stats)
    }

    /// Drain one anchor's candidate worklist.
    fn merge_move(
        &self,
        clusters: &mut GlobalClusters,
        maha: &mut DistanceMatrix,
        mut anchor: usize,
        stats: &mut MergeStats,
    ) -> ClusterResult<()> {
        let gate = self.config.merge_distance_gate;
        let mut queue = maha.gated_neighbors(anchor, gate);

        while let Some(candidate) = queue.pop() {
            let ka = anchor.min(candidate);
            let kb = anchor.max(candidate);

            match self.attempt(clusters, ka, kb)? {
                Some(merged) => {
                    debug!(ka, kb, "merging components");
                    clusters.state.replace_component(ka, &merged, 0)?;
                    clusters.state.delete_component(kb);
                    clusters.responsibilities.merge_components(ka, kb);
                    clusters.origin_channels.remove(kb);

                    maha.remove(kb);
                    maha.refresh_component(&clusters.state, ka);

                    queue = maha.gated_neighbors(ka, gate);
                    anchor = ka;
                    stats.merges += 1;
                }
                None => {
                    maha.mark_rejected(ka, kb);
                    stats.rejections += 1;
                }
            }
        }
        Ok(())
    }

    /// Run the external merge test on the (`ka`, `kb`) pair. Returns the
    /// merged single-component state on acceptance, `None` on rejection.
    /// Collaborator failures and malformed results count as rejections.
    fn attempt(
        &self,
        clusters: &GlobalClusters,
        ka: usize,
        kb: usize,
    ) -> ClusterResult<Option<MixtureState>> {
        let spikes = clusters.responsibilities.spikes_of_any(&[ka, kb]);
        if spikes.is_empty() {
            return Ok(None);
        }
        let local_resp = clusters.responsibilities.local_dense(&spikes, &[ka, kb])?;
        let local_features = clusters.features.gather(&spikes);
        let local_state = clusters.state.gather(&[ka, kb]);

        let decision =
            match self
                .test
                .test_merge(&local_features, &local_state, &local_resp, self.config)
            {
                Ok(decision) => decision,
                Err(err) => {
                    warn!(ka, kb, error = %err, "merge test failed, treating pair as rejected");
                    return Ok(None);
                }
            };

        match decision {
            MergeDecision::Rejected => Ok(None),
            MergeDecision::Merged(merged) => {
                if merged.n_components() != 1 || merged.dim() != clusters.state.dim() {
                    warn!(ka, kb, "merge test returned a malformed state, rejecting");
                    return Ok(None);
                }
                if !merged.is_finite() {
                    warn!(ka, kb, "merge test returned non-finite parameters, rejecting");
                    return Ok(None);
                }
                Ok(Some(merged))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spike_sort_core::{
        DenseResponsibilities, FeatureMatrix, MixtureState, SparseResponsibilities, SpikeRef,
    };

    use crate::error::ClusterError;

    fn identity(dim: usize) -> Vec<f32> {
        let mut m = vec![0.0; dim * dim];
        for i in 0..dim {
            m[i * dim + i] = 1.0;
        }
        m
    }

    /// Three unit-precision components at the given 1-d means, one spike
    /// cluster of `n_per` spikes hard-assigned to each.
    fn collection(means: &[f32], n_per: usize) -> GlobalClusters {
        let k = means.len();
        let mut state = MixtureState::empty(1);
        for &m in means {
            state
                .push_component(vec![m], identity(1), identity(1), 1.0, 1.0, 1.0)
                .unwrap();
        }
        let mut rows = Vec::new();
        let mut feats = Vec::new();
        let mut refs = Vec::new();
        for (c, &m) in means.iter().enumerate() {
            for s in 0..n_per {
                let mut row = vec![0.0; k];
                row[c] = 1.0;
                rows.push(row);
                feats.push(vec![m + s as f32 * 1e-3]);
                refs.push(SpikeRef::new((c * n_per + s) as u64, 0));
            }
        }
        let dense = DenseResponsibilities::from_rows(&rows, k).unwrap();
        GlobalClusters {
            state,
            responsibilities: SparseResponsibilities::from_dense(&dense),
            origin_channels: vec![0; k],
            features: FeatureMatrix::from_rows(&feats).unwrap(),
            spike_refs: refs,
        }
    }

    /// Accepts every attempted merge, averaging the two means.
    struct AcceptAll;

    impl MergeTest for AcceptAll {
        fn test_merge(
            &self,
            _features: &FeatureMatrix,
            state: &MixtureState,
            _responsibilities: &DenseResponsibilities,
            _config: &ClusteringConfig,
        ) -> ClusterResult<MergeDecision> {
            let dim = state.dim();
            let mean: Vec<f32> = (0..dim)
                .map(|d| (state.mean(0)[d] + state.mean(1)[d]) / 2.0)
                .collect();
            let mut merged = MixtureState::empty(dim);
            merged
                .push_component(
                    mean,
                    state.cov_factor(0).to_vec(),
                    state.inv_cov_factor(0).to_vec(),
                    state.dof(0),
                    state.precision_scale(0),
                    state.pseudo_count(0) + state.pseudo_count(1),
                )
                .unwrap();
            Ok(MergeDecision::Merged(merged))
        }
    }

    struct RejectAll;

    impl MergeTest for RejectAll {
        fn test_merge(
            &self,
            _features: &FeatureMatrix,
            _state: &MixtureState,
            _responsibilities: &DenseResponsibilities,
            _config: &ClusteringConfig,
        ) -> ClusterResult<MergeDecision> {
            Ok(MergeDecision::Rejected)
        }
    }

    struct FailAlways;

    impl MergeTest for FailAlways {
        fn test_merge(
            &self,
            _features: &FeatureMatrix,
            _state: &MixtureState,
            _responsibilities: &DenseResponsibilities,
            _config: &ClusteringConfig,
        ) -> ClusterResult<MergeDecision> {
            Err(ClusterError::MergeTest("collaborator exploded".into()))
        }
    }

    #[test]
    fn test_accepted_merge_decrements_count_and_conserves_mass() {
        // two close components, one far
        let mut clusters = collection(&[0.0, 1.0, 100.0], 5);
        let mass_before = clusters.responsibilities.total_mass();
        let config = ClusteringConfig::new(1);
        let engine = MergeEngine::new(&AcceptAll, &config);
        let stats = engine.consolidate(&mut clusters).unwrap();

        assert_eq!(stats.merges, 1);
        assert_eq!(clusters.n_components(), 2);
        assert_eq!(clusters.origin_channels.len(), 2);
        // survivor holds both components' mass
        assert!((clusters.responsibilities.column_mass(0) - 10.0).abs() < 1e-5);
        assert!((clusters.responsibilities.total_mass() - mass_before).abs() < 1e-5);
        // merged mean replaced the lower index
        assert!((clusters.state.mean(0)[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_rejection_is_permanent() {
        let mut clusters = collection(&[0.0, 1.0], 5);
        let config = ClusteringConfig::new(1);
        let engine = MergeEngine::new(&RejectAll, &config);
        let stats = engine.consolidate(&mut clusters).unwrap();

        assert_eq!(stats.merges, 0);
        assert_eq!(stats.rejections, 1);
        assert_eq!(clusters.n_components(), 2);

        // a second pass finds nothing to do
        let stats2 = engine.consolidate(&mut clusters).unwrap();
        assert_eq!(stats2, MergeStats::default());
    }

    #[test]
    fn test_far_pairs_are_never_tested() {
        let mut clusters = collection(&[0.0, 100.0], 5);
        let config = ClusteringConfig::new(1);
        // AcceptAll would merge anything it is asked about; the gate must
        // keep it from being asked
        let engine = MergeEngine::new(&AcceptAll, &config);
        let stats = engine.consolidate(&mut clusters).unwrap();
        assert_eq!(stats, MergeStats::default());
        assert_eq!(clusters.n_components(), 2);
    }

    #[test]
    fn test_chained_merges_collapse_a_clique() {
        // three mutually close components collapse to one through the
        // survivor-as-new-anchor rule
        let mut clusters = collection(&[0.0, 1.0, 2.0], 5);
        let config = ClusteringConfig::new(1);
        let engine = MergeEngine::new(&AcceptAll, &config);
        let stats = engine.consolidate(&mut clusters).unwrap();

        assert_eq!(stats.merges, 2);
        assert_eq!(clusters.n_components(), 1);
        assert!((clusters.responsibilities.column_mass(0) - 15.0).abs() < 1e-5);
    }

    #[test]
    fn test_collaborator_failure_degrades_to_rejection() {
        let mut clusters = collection(&[0.0, 1.0], 5);
        let config = ClusteringConfig::new(1);
        let engine = MergeEngine::new(&FailAlways, &config);
        let stats = engine.consolidate(&mut clusters).unwrap();

        assert_eq!(stats.merges, 0);
        assert_eq!(stats.rejections, 1);
        assert_eq!(clusters.n_components(), 2);
    }

    /// Returns NaN parameters; must be treated as a rejection.
    struct NonFinite;

    impl MergeTest for NonFinite {
        fn test_merge(
            &self,
            _features: &FeatureMatrix,
            state: &MixtureState,
            _responsibilities: &DenseResponsibilities,
            _config: &ClusteringConfig,
        ) -> ClusterResult<MergeDecision> {
            let mut merged = MixtureState::empty(state.dim());
            merged
                .push_component(
                    vec![f32::NAN; state.dim()],
                    state.cov_factor(0).to_vec(),
                    state.inv_cov_factor(0).to_vec(),
                    state.dof(0),
                    state.precision_scale(0),
                    state.pseudo_count(0),
                )
                .unwrap();
            Ok(MergeDecision::Merged(merged))
        }
    }

    #[test]
    fn test_non_finite_result_degrades_to_rejection() {
        let mut clusters = collection(&[0.0, 1.0], 5);
        let config = ClusteringConfig::new(1);
        let engine = MergeEngine::new(&NonFinite, &config);
        let stats = engine.consolidate(&mut clusters).unwrap();
        assert_eq!(stats.rejections, 1);
        assert_eq!(clusters.n_components(), 2);
    }
}
