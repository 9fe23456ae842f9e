//! Batches of raw spike waveform segments.

use crate::error::{CoreError, CoreResult};

/// A batch of waveform segments, one per spike, laid out row-major as
/// `[spike][sample][channel]` in a single flat buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformBatch {
    values: Vec<f32>,
    n_spikes: usize,
    n_samples: usize,
    n_channels: usize,
}

impl WaveformBatch {
    /// Wrap a flat buffer as a waveform batch.
    pub fn new(
        values: Vec<f32>,
        n_spikes: usize,
        n_samples: usize,
        n_channels: usize,
    ) -> CoreResult<Self> {
        let expected = n_spikes * n_samples * n_channels;
        if values.len() != expected {
            return Err(CoreError::length_mismatch(
                "waveform buffer vs shape",
                values.len(),
                expected,
            ));
        }
        Ok(Self {
            values,
            n_spikes,
            n_samples,
            n_channels,
        })
    }

    /// Number of spikes in the batch.
    pub fn n_spikes(&self) -> usize {
        self.n_spikes
    }

    /// Samples per waveform segment.
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Recording channels per sample.
    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    /// Value at `[spike][sample][channel]`.
    pub fn get(&self, spike: usize, sample: usize, channel: usize) -> f32 {
        self.values[(spike * self.n_samples + sample) * self.n_channels + channel]
    }

    /// One spike's trace on one channel, copied out as a contiguous vector.
    pub fn channel_trace(&self, spike: usize, channel: usize) -> Vec<f32> {
        (0..self.n_samples)
            .map(|sample| self.get(spike, sample, channel))
            .collect()
    }

    /// Mean waveform across spikes, laid out `[sample][channel]`.
    ///
    /// # Errors
    /// `EmptyInput` if the batch holds no spikes.
    pub fn mean_waveform(&self) -> CoreResult<Vec<f32>> {
        if self.n_spikes == 0 {
            return Err(CoreError::EmptyInput("waveform batch"));
        }
        let frame = self.n_samples * self.n_channels;
        let mut mean = vec![0.0f64; frame];
        for spike in 0..self.n_spikes {
            let row = &self.values[spike * frame..(spike + 1) * frame];
            for (acc, &v) in mean.iter_mut().zip(row) {
                *acc += f64::from(v);
            }
        }
        let n = self.n_spikes as f64;
        Ok(mean.into_iter().map(|v| (v / n) as f32).collect())
    }

    /// Copy the selected spikes, in the given order, into a new batch.
    pub fn gather(&self, spikes: &[usize]) -> Self {
        let frame = self.n_samples * self.n_channels;
        let mut values = Vec::with_capacity(spikes.len() * frame);
        for &spike in spikes {
            values.extend_from_slice(&self.values[spike * frame..(spike + 1) * frame]);
        }
        Self {
            values,
            n_spikes: spikes.len(),
            n_samples: self.n_samples,
            n_channels: self.n_channels,
        }
    }
}
