//! Settings for chunked waveform loading.

use serde::{Deserialize, Serialize};

use crate::error::{ClusterError, ClusterResult};

/// Configuration of the chunked recording reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Length of one processing chunk, in seconds of recording.
    pub chunk_seconds: usize,
    /// Overlap buffer, in frames, read on both sides of every chunk so
    /// windows spanning a chunk boundary stay whole.
    pub buffer_frames: usize,
    /// Half-width of the extracted waveform window, in frames. A segment
    /// covers `2 * half_window + 1` samples centred on the spike time.
    pub half_window: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            chunk_seconds: 60,
            buffer_frames: 200,
            half_window: 15,
        }
    }
}

impl LoaderConfig {
    /// Samples per extracted waveform segment.
    pub fn n_samples(&self) -> usize {
        2 * self.half_window + 1
    }

    /// Validate all settings.
    pub fn validate(&self) -> ClusterResult<()> {
        if self.chunk_seconds == 0 {
            return Err(ClusterError::invalid_param(
                "chunk_seconds",
                self.chunk_seconds,
                "must be positive",
            ));
        }
        if self.buffer_frames < self.half_window {
            return Err(ClusterError::invalid_param(
                "buffer_frames",
                self.buffer_frames,
                format!(
                    "must cover the waveform half-window ({})",
                    self.half_window
                ),
            ));
        }
        Ok(())
    }
}
