//! Per-channel clustering orchestration.
//!
//! One mixture is fitted per channel over the spikes whose main channel
//! matches, responsibilities are floored and renormalized, near-empty
//! components pruned, and the survivors folded into the global collection.
//! Fits are mutually independent and run in parallel; folds are sequential
//! in ascending channel order so global ids are reproducible given a
//! deterministic fitter.

use rayon::prelude::*;
use tracing::{debug, info};

use spike_sort_core::{FeatureMatrix, MaskGroup, SpikeRef};

use crate::aggregate::{ChannelContribution, GlobalAccumulator, GlobalClusters};
use crate::config::ClusteringConfig;
use crate::error::{ClusterError, ClusterResult};
use crate::fit::MixtureFitter;
use crate::prune::prune_empty_components;

/// Orchestrates per-channel mixture fits and their global aggregation.
pub struct ChannelClusterer<'a, F: MixtureFitter> {
    fitter: &'a F,
    config: &'a ClusteringConfig,
}

impl<'a, F: MixtureFitter> ChannelClusterer<'a, F> {
    /// Create an orchestrator over the given fitter and configuration.
    pub fn new(fitter: &'a F, config: &'a ClusteringConfig) -> Self {
        Self { fitter, config }
    }

    /// Cluster every channel and fold the results into one global
    /// collection.
    ///
    /// `mask_groups`, when present, supplies one mask/group pair per
    /// channel (the coreset mode); otherwise each channel gets the unit
    /// mask with singleton groups (the location-feature mode).
    ///
    /// Returns `None` when no channel produced a surviving component.
    ///
    /// # Errors
    /// Fails fast on mismatched input lengths or an out-of-range channel
    /// before any global state is touched; propagates fitter failures.
    pub fn cluster(
        &self,
        features: &FeatureMatrix,
        spike_refs: &[SpikeRef],
        mask_groups: Option<&[MaskGroup]>,
    ) -> ClusterResult<Option<GlobalClusters>> {
        self.config.validate()?;
        let n_channels = self.config.n_channels;

        if features.n_spikes() != spike_refs.len() {
            return Err(ClusterError::FeatureSpikeMismatch {
                features: features.n_spikes(),
                spikes: spike_refs.len(),
            });
        }
        if let Some(bad) = spike_refs.iter().find(|r| r.channel >= n_channels) {
            return Err(ClusterError::ChannelOutOfRange {
                channel: bad.channel,
                n_channels,
            });
        }
        if let Some(groups) = mask_groups {
            if groups.len() != n_channels {
                return Err(ClusterError::Core(
                    spike_sort_core::CoreError::length_mismatch(
                        "mask groups vs channels",
                        groups.len(),
                        n_channels,
                    ),
                ));
            }
        }

        let mut channel_spikes: Vec<Vec<usize>> = vec![Vec::new(); n_channels];
        for (spike, r) in spike_refs.iter().enumerate() {
            channel_spikes[r.channel].push(spike);
        }

        // Independent fits fan out; the fold below stays sequential.
        let outcomes: Vec<Option<ChannelContribution>> = channel_spikes
            .par_iter()
            .enumerate()
            .map(|(channel, spikes)| {
                self.cluster_channel(channel, spikes, features, spike_refs, mask_groups)
            })
            .collect::<ClusterResult<Vec<_>>>()?;

        let mut accumulator = GlobalAccumulator::new();
        for contribution in outcomes.into_iter().flatten() {
            accumulator.fold(contribution)?;
        }
        Ok(accumulator.finish())
    }

    fn cluster_channel(
        &self,
        channel: usize,
        spikes: &[usize],
        features: &FeatureMatrix,
        spike_refs: &[SpikeRef],
        mask_groups: Option<&[MaskGroup]>,
    ) -> ClusterResult<Option<ChannelContribution>> {
        if spikes.len() < 2 {
            debug!(channel, n_spikes = spikes.len(), "skipping channel");
            return Ok(None);
        }
        info!(channel, n_spikes = spikes.len(), "clustering channel");

        let channel_features = features.gather(spikes);
        let mask_group = match mask_groups {
            Some(groups) => {
                let mg = &groups[channel];
                if mg.len() != spikes.len() {
                    return Err(ClusterError::Core(
                        spike_sort_core::CoreError::length_mismatch(
                            "channel mask group vs channel spikes",
                            mg.len(),
                            spikes.len(),
                        ),
                    ));
                }
                mg.clone()
            }
            None => MaskGroup::trivial(spikes.len()),
        };

        let fitted = self
            .fitter
            .fit(&channel_features, &mask_group, self.config)?;
        if fitted.responsibilities.n_spikes() != spikes.len() {
            return Err(ClusterError::Fit(format!(
                "fitter returned {} responsibility rows for {} spikes",
                fitted.responsibilities.n_spikes(),
                spikes.len()
            )));
        }

        let mut responsibilities = fitted.responsibilities;
        responsibilities.threshold_and_renormalize(self.config.responsibility_floor);

        let (state, responsibilities) = prune_empty_components(
            fitted.state,
            responsibilities,
            self.config.min_cluster_mass,
        );
        if state.is_empty() {
            debug!(channel, "no component survived pruning");
            return Ok(None);
        }
        info!(channel, n_components = state.n_components(), "channel clustered");

        Ok(Some(ChannelContribution {
            channel,
            state,
            responsibilities,
            features: channel_features,
            spike_refs: spikes.iter().map(|&s| spike_refs[s]).collect(),
        }))
    }
}
