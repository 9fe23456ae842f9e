//! Stability-based splitting pipeline.
//!
//! An alternative entry point that clusters straight from waveforms: per
//! channel, load the spike waveforms, pick feature channels by amplitude
//! and variability, align every trace to the mean template, project the
//! concatenated aligned windows, triage outliers, and iteratively extract
//! stable clusters. Finalized clusters receive process-wide incrementing
//! ids and the whole output is sorted by spike time.

pub mod align;
pub mod channels;
pub mod pca;
pub mod stability;
pub mod triage;

use tracing::{debug, info};

use spike_sort_core::{FeatureMatrix, SpikeLabel, SpikeRef, SpikeTrain, WaveformBatch};

use crate::config::{SortConfig, SplittingConfig};
use crate::error::{ClusterError, ClusterResult};
use crate::fit::MixtureFitter;
use crate::waveform::WaveformLoader;

use align::align_channel_waveforms;
use channels::select_feature_channels;
use pca::{project, Pca};
use stability::iterative_extraction;
use triage::triage_outliers;

/// Concatenate the aligned, windowed traces of every feature channel into
/// one flat feature row per spike.
pub(crate) fn build_aligned_features(
    waveforms: &WaveformBatch,
    feature_channels: &[usize],
    config: &SplittingConfig,
) -> ClusterResult<FeatureMatrix> {
    let n_spikes = waveforms.n_spikes();
    if n_spikes == 0 {
        return Err(ClusterError::EmptyInput("waveform batch"));
    }
    let window_end = config.window_end.min(waveforms.n_samples());
    if config.window_start >= window_end {
        return Err(ClusterError::invalid_param(
            "window_start/window_end",
            format!("{}/{}", config.window_start, config.window_end),
            format!(
                "window must be non-empty within {} samples",
                waveforms.n_samples()
            ),
        ));
    }
    let window = window_end - config.window_start;

    let mut rows = vec![Vec::with_capacity(window * feature_channels.len()); n_spikes];
    for &channel in feature_channels {
        let traces: Vec<Vec<f32>> = (0..n_spikes)
            .map(|spike| waveforms.channel_trace(spike, channel))
            .collect();
        let aligned = align_channel_waveforms(&traces, &config.alignment)?;
        for (row, trace) in rows.iter_mut().zip(&aligned) {
            row.extend_from_slice(&trace[config.window_start..window_end]);
        }
    }
    Ok(FeatureMatrix::from_rows(&rows)?)
}

/// Output of the splitting pipeline: the time-sorted spike train and the
/// originating channel of every cluster id.
#[derive(Debug, Clone)]
pub struct SplitOutput {
    /// Labeled spikes, sorted ascending by time.
    pub spike_train: SpikeTrain,
    /// Origin channel of each cluster, indexed by cluster id.
    pub origin_channels: Vec<usize>,
}

/// The per-channel splitting pipeline driver.
pub struct SplittingPipeline<'a, F: MixtureFitter, L: WaveformLoader> {
    fitter: &'a F,
    loader: &'a L,
    config: &'a SortConfig,
}

impl<'a, F: MixtureFitter, L: WaveformLoader> SplittingPipeline<'a, F, L> {
    /// Create a pipeline over the given fitter, waveform loader and
    /// configuration.
    pub fn new(fitter: &'a F, loader: &'a L, config: &'a SortConfig) -> Self {
        Self {
            fitter,
            loader,
            config,
        }
    }

    /// Run the pipeline over every channel of the configured universe.
    ///
    /// # Errors
    /// Fails fast on an out-of-range channel reference; per-channel
    /// numerical work propagates its own errors.
    pub fn run(&self, spike_refs: &[SpikeRef]) -> ClusterResult<SplitOutput> {
        self.config.validate()?;
        let split = &self.config.splitting;
        if let Some(bad) = spike_refs
            .iter()
            .find(|r| r.channel >= split.n_channels)
        {
            return Err(ClusterError::ChannelOutOfRange {
                channel: bad.channel,
                n_channels: split.n_channels,
            });
        }

        let mut rows: Vec<SpikeLabel> = Vec::new();
        let mut origin_channels = Vec::new();

        for channel in 0..split.n_channels {
            let channel_refs: Vec<&SpikeRef> = spike_refs
                .iter()
                .filter(|r| r.channel == channel)
                .collect();
            let groups = self.split_channel(channel, &channel_refs)?;
            for group in groups {
                let cluster = origin_channels.len();
                origin_channels.push(channel);
                for point in group {
                    rows.push(SpikeLabel {
                        time: channel_refs[point].time,
                        cluster,
                    });
                }
            }
        }

        info!(
            n_clusters = origin_channels.len(),
            n_spikes = rows.len(),
            "splitting pipeline finished"
        );
        Ok(SplitOutput {
            spike_train: SpikeTrain::from_rows(rows),
            origin_channels,
        })
    }

    /// Cluster one channel. Returned groups index into `channel_refs`.
    fn split_channel(
        &self,
        channel: usize,
        channel_refs: &[&SpikeRef],
    ) -> ClusterResult<Vec<Vec<usize>>> {
        let split = &self.config.splitting;
        if channel_refs.len() < 2 {
            debug!(channel, n_spikes = channel_refs.len(), "skipping channel");
            return Ok(Vec::new());
        }
        info!(channel, n_spikes = channel_refs.len(), "splitting channel");

        let refs: Vec<SpikeRef> = channel_refs.iter().map(|&&r| r).collect();
        let waveforms = self
            .loader
            .load(&refs, self.config.loader.half_window)?;

        let feature_channels = select_feature_channels(&waveforms, split)?;
        if feature_channels.is_empty() {
            debug!(channel, "no feature channel selected");
            return Ok(Vec::new());
        }
        debug!(channel, ?feature_channels, "selected feature channels");

        let flat = build_aligned_features(&waveforms, &feature_channels, split)?;
        let projected = project(&flat, split.n_pca_components)?;

        // outlier triage, then a fresh projection fitted on the survivors
        let kept = triage_outliers(&projected, split.triage_neighbors, split.triage_percentile);
        if kept.len() < 2 {
            debug!(channel, n_kept = kept.len(), "triage left too few points");
            return Ok(Vec::new());
        }
        let kept_flat = flat.gather(&kept);
        let kept_features = Pca::fit(&kept_flat, split.n_pca_components)?.transform(&kept_flat)?;
        let kept_waveforms = waveforms.gather(&kept);

        let groups = iterative_extraction(
            self.fitter,
            &kept_waveforms,
            &feature_channels,
            kept_features,
            split,
            &self.config.clustering,
        )?;

        // map back from triaged rows to the channel's spike indices
        Ok(groups
            .into_iter()
            .map(|group| group.into_iter().map(|row| kept[row]).collect())
            .collect())
    }
}
