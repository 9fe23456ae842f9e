//! Feature-channel selection for the splitting pipeline.
//!
//! Channels are ranked two ways on one batch of waveforms: by peak-to-peak
//! amplitude of the mean template, and by maximum median-absolute-deviation
//! across spikes among channels whose template amplitude clears the
//! threshold. The top of both rankings unions into the feature-channel
//! set.

use spike_sort_core::WaveformBatch;

use crate::config::SplittingConfig;
use crate::error::ClusterResult;

/// Scale factor turning a median absolute deviation into a consistent
/// standard-deviation estimate for normal data.
const MAD_SCALE: f32 = 1.4826;

fn median(values: &mut [f32]) -> f32 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Median absolute deviation of one channel at one sample, across spikes.
fn mad_across_spikes(waveforms: &WaveformBatch, sample: usize, channel: usize) -> f32 {
    let mut values: Vec<f32> = (0..waveforms.n_spikes())
        .map(|s| waveforms.get(s, sample, channel))
        .collect();
    let med = median(&mut values);
    let mut deviations: Vec<f32> = values.iter().map(|v| (v - med).abs()).collect();
    median(&mut deviations) * MAD_SCALE
}

/// Indices of the top `k` values, descending, ties broken toward the lower
/// index.
fn top_k_desc(scores: &[f32], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    order.truncate(k);
    order
}

/// Select the feature-channel set for one channel's waveform batch:
/// the union of the top amplitude-ranked channels and the top MAD-ranked
/// channels above the amplitude threshold, sorted ascending.
pub fn select_feature_channels(
    waveforms: &WaveformBatch,
    config: &SplittingConfig,
) -> ClusterResult<Vec<usize>> {
    let template = waveforms.mean_waveform()?;
    let n_samples = waveforms.n_samples();
    let n_channels = waveforms.n_channels();

    // peak-to-peak range of the template, per channel
    let mut ptp_min = vec![f32::INFINITY; n_channels];
    let mut ptp_max = vec![f32::NEG_INFINITY; n_channels];
    for sample in 0..n_samples {
        for channel in 0..n_channels {
            let v = template[sample * n_channels + channel];
            ptp_min[channel] = ptp_min[channel].min(v);
            ptp_max[channel] = ptp_max[channel].max(v);
        }
    }
    let ptp: Vec<f32> = (0..n_channels).map(|c| ptp_max[c] - ptp_min[c]).collect();

    let mut selected = top_k_desc(&ptp, config.n_amplitude_channels);

    // variability ranking is restricted to channels with real signal
    let candidates: Vec<usize> = (0..n_channels)
        .filter(|&c| ptp[c] > config.amplitude_threshold)
        .collect();
    let mad_scores: Vec<f32> = candidates
        .iter()
        .map(|&c| {
            (0..n_samples)
                .map(|sample| mad_across_spikes(waveforms, sample, c))
                .fold(f32::NEG_INFINITY, f32::max)
        })
        .collect();
    for rank in top_k_desc(&mad_scores, config.n_mad_channels) {
        selected.push(candidates[rank]);
    }

    selected.sort_unstable();
    selected.dedup();
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Batch where channel 1 carries a strong clean pulse, channel 2 a
    /// weaker pulse with high spike-to-spike variability, and channel 0
    /// almost nothing.
    fn fixture() -> WaveformBatch {
        let (n_spikes, n_samples, n_channels) = (20, 11, 3);
        let mut values = vec![0.0f32; n_spikes * n_samples * n_channels];
        for spike in 0..n_spikes {
            for sample in 0..n_samples {
                let d = sample as f32 - 5.0;
                let pulse = (-d * d / 2.0).exp();
                let base = (spike * n_samples + sample) * n_channels;
                values[base] = 0.1 * pulse;
                values[base + 1] = 10.0 * pulse;
                // amplitude jitter makes channel 2 highly variable without
                // cancelling its template
                let gain = if spike % 2 == 0 { 9.0 } else { 3.0 };
                values[base + 2] = gain * pulse;
            }
        }
        WaveformBatch::new(values, n_spikes, n_samples, n_channels).unwrap()
    }

    fn config(n_amp: usize, n_mad: usize) -> SplittingConfig {
        SplittingConfig {
            n_channels: 3,
            n_amplitude_channels: n_amp,
            n_mad_channels: n_mad,
            amplitude_threshold: 2.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_amplitude_ranking_finds_the_loud_channel() {
        let batch = fixture();
        let selected = select_feature_channels(&batch, &config(1, 0)).unwrap();
        assert_eq!(selected, vec![1]);
    }

    #[test]
    fn test_mad_ranking_finds_the_variable_channel() {
        let batch = fixture();
        // channels 1 and 2 both clear the ptp gate; channel 1 is identical
        // across spikes (MAD 0) while channel 2 jitters, so the single MAD
        // slot goes to channel 2
        let selected = select_feature_channels(&batch, &config(1, 1)).unwrap();
        assert_eq!(selected, vec![1, 2]);
    }

    #[test]
    fn test_union_is_sorted_and_deduplicated() {
        let batch = fixture();
        let selected = select_feature_channels(&batch, &config(3, 3)).unwrap();
        let mut sorted = selected.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(selected, sorted);
    }

    #[test]
    fn test_mad_scale_is_consistent_estimator() {
        // MAD of a symmetric two-point distribution {-3, 3}: median 0,
        // deviations all 3
        let mut values = vec![-3.0, 3.0, -3.0, 3.0];
        let med = median(&mut values);
        assert_eq!(med, 0.0);
    }
}
