//! Global aggregation of per-channel clustering results.
//!
//! Per-channel mixtures fold into one globally indexed collection. The
//! accumulator owns the running spike and component offsets explicitly, so
//! ids stay unique across channels and reproducible for a fixed fold order.

use spike_sort_core::{
    DenseResponsibilities, FeatureMatrix, MixtureState, SparseResponsibilities, SpikeLabel,
    SpikeRef, SpikeTrain,
};

use crate::error::{ClusterError, ClusterResult};

/// The globally indexed cluster collection: parameters concatenated along
/// the component axis, the sparse responsibility relation over global ids,
/// the originating channel of every component, and the feature rows and
/// spike references in fold order.
#[derive(Debug, Clone)]
pub struct GlobalClusters {
    /// Concatenated component parameters.
    pub state: MixtureState,
    /// Sparse responsibility relation over global spike/component ids.
    pub responsibilities: SparseResponsibilities,
    /// Originating channel of each component.
    pub origin_channels: Vec<usize>,
    /// Feature rows in global spike-id order.
    pub features: FeatureMatrix,
    /// Spike references in global spike-id order.
    pub spike_refs: Vec<SpikeRef>,
}

impl GlobalClusters {
    /// Number of global components.
    pub fn n_components(&self) -> usize {
        self.state.n_components()
    }

    /// Number of global spikes (assigned or not).
    pub fn n_spikes(&self) -> usize {
        self.spike_refs.len()
    }

    /// Hard-assign every spike with surviving responsibility mass to its
    /// highest-mass component and emit the time-sorted spike train.
    /// Unassigned spikes are omitted.
    pub fn to_spike_train(&self) -> SpikeTrain {
        let rows = self
            .responsibilities
            .argmax_assignments()
            .into_iter()
            .map(|(spike, component)| SpikeLabel {
                time: self.spike_refs[spike].time,
                cluster: component,
            })
            .collect();
        SpikeTrain::from_rows(rows)
    }
}

/// One channel's post-processed contribution, ready to fold.
#[derive(Debug, Clone)]
pub struct ChannelContribution {
    /// Channel that produced the components.
    pub channel: usize,
    /// Pruned component parameters.
    pub state: MixtureState,
    /// Post-processed dense responsibilities over the channel's spikes.
    pub responsibilities: DenseResponsibilities,
    /// The channel's feature rows, in the same spike order.
    pub features: FeatureMatrix,
    /// The channel's spike references, in the same spike order.
    pub spike_refs: Vec<SpikeRef>,
}

/// Sequential fold of channel contributions into a [`GlobalClusters`].
///
/// The accumulator is the single writer of the global collection; channel
/// fits may run in parallel but every fold goes through here, in ascending
/// channel order.
#[derive(Debug, Default)]
pub struct GlobalAccumulator {
    inner: Option<GlobalClusters>,
    n_spikes: usize,
    n_components: usize,
}

impl GlobalAccumulator {
    /// An empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of components folded so far.
    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Fold one channel's contribution, shifting its local spike and
    /// component ids by the running offsets.
    pub fn fold(&mut self, contribution: ChannelContribution) -> ClusterResult<()> {
        let ChannelContribution {
            channel,
            state,
            responsibilities,
            features,
            spike_refs,
        } = contribution;

        let n_new_spikes = spike_refs.len();
        let n_new_components = state.n_components();
        if responsibilities.n_spikes() != n_new_spikes {
            return Err(ClusterError::Core(
                spike_sort_core::CoreError::length_mismatch(
                    "channel responsibilities vs spike refs",
                    responsibilities.n_spikes(),
                    n_new_spikes,
                ),
            ));
        }

        let mut sparse = SparseResponsibilities::from_dense(&responsibilities);
        sparse.offset_ids(self.n_spikes, self.n_components);

        match &mut self.inner {
            None => {
                self.inner = Some(GlobalClusters {
                    state,
                    responsibilities: sparse,
                    origin_channels: vec![channel; n_new_components],
                    features,
                    spike_refs,
                });
            }
            Some(global) => {
                global.state.concat(state)?;
                global.responsibilities.append(sparse);
                global
                    .origin_channels
                    .extend(std::iter::repeat(channel).take(n_new_components));
                global.features.append(&features)?;
                global.spike_refs.extend(spike_refs);
            }
        }

        self.n_spikes += n_new_spikes;
        self.n_components += n_new_components;

        if let Some(global) = &self.inner {
            debug_assert_eq!(global.origin_channels.len(), global.state.n_components());
        }
        Ok(())
    }

    /// Finish folding. `None` when no channel contributed any component.
    pub fn finish(self) -> Option<GlobalClusters> {
        self.inner
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

    fn contribution(channel: usize, means: &[Vec<f32>], n_spikes: usize) -> ChannelContribution {
        let dim = means[0].len();
        let mut state = MixtureState::empty(dim);
        for mean in means {
            state
                .push_component(mean.clone(), identity(dim), identity(dim), 1.0, 1.0, 1.0)
                .unwrap();
        }
        let k = means.len();
        let rows: Vec<Vec<f32>> = (0..n_spikes)
            .map(|s| {
                let mut row = vec![0.0; k];
                row[s % k] = 1.0;
                row
            })
            .collect();
        let responsibilities = DenseResponsibilities::from_rows(&rows, k).unwrap();
        let features = FeatureMatrix::from_rows(
            &(0..n_spikes).map(|s| vec![s as f32; dim]).collect::<Vec<_>>(),
        )
        .unwrap();
        let spike_refs = (0..n_spikes)
            .map(|s| SpikeRef::new((channel * 1000 + s) as u64, channel))
            .collect();
        ChannelContribution {
            channel,
            state,
            responsibilities,
            features,
            spike_refs,
        }
    }

    #[test]
    fn test_first_fold_becomes_global() {
        let mut acc = GlobalAccumulator::new();
        acc.fold(contribution(0, &[vec![0.0], vec![1.0]], 4)).unwrap();
        let global = acc.finish().unwrap();
        assert_eq!(global.n_components(), 2);
        assert_eq!(global.origin_channels, vec![0, 0]);
        assert_eq!(global.n_spikes(), 4);
    }

    #[test]
    fn test_component_count_is_sum_over_channels() {
        let mut acc = GlobalAccumulator::new();
        acc.fold(contribution(0, &[vec![0.0], vec![1.0]], 4)).unwrap();
        acc.fold(contribution(2, &[vec![5.0]], 3)).unwrap();
        let global = acc.finish().unwrap();
        assert_eq!(global.n_components(), 3);
        assert_eq!(global.origin_channels, vec![0, 0, 2]);
        // origin-channel invariant
        assert_eq!(global.origin_channels.len(), global.state.n_components());
    }

    #[test]
    fn test_ids_are_shifted_per_fold() {
        let mut acc = GlobalAccumulator::new();
        acc.fold(contribution(0, &[vec![0.0], vec![1.0]], 4)).unwrap();
        acc.fold(contribution(1, &[vec![5.0]], 3)).unwrap();
        let global = acc.finish().unwrap();
        // channel 1's spikes occupy global ids 4..7 and component id 2
        assert_eq!(global.responsibilities.spikes_of_any(&[2]), vec![4, 5, 6]);
        assert!((global.responsibilities.column_mass(2) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_accumulator_finishes_none() {
        assert!(GlobalAccumulator::new().finish().is_none());
    }

    #[test]
    fn test_spike_train_sorted_and_labeled() {
        let mut acc = GlobalAccumulator::new();
        acc.fold(contribution(1, &[vec![0.0], vec![1.0]], 4)).unwrap();
        acc.fold(contribution(0, &[vec![5.0]], 2)).unwrap();
        let global = acc.finish().unwrap();
        let train = global.to_spike_train();
        assert_eq!(train.len(), 6);
        let times: Vec<u64> = train.rows().iter().map(|r| r.time).collect();
        let mut sorted = times.clone();
        sorted.sort_unstable();
        assert_eq!(times, sorted);
        assert_eq!(train.cluster_ids(), vec![0, 1, 2]);
    }
}
