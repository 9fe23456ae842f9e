//! Settings for the stability-based splitting pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{ClusterError, ClusterResult};

/// Sub-sample alignment settings.
///
/// Shift and window extents are expressed in original-rate steps and scaled
/// by the upsample factor internally, matching the fixed 7-step extents of
/// the reference pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentConfig {
    /// Bandlimited upsampling factor applied before cross-correlation.
    pub upsample_factor: usize,
    /// Half-width of the candidate shift range, in original-rate steps.
    pub shift_steps: usize,
    /// Half-width of the correlation window, in original-rate steps.
    pub window_steps: usize,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            upsample_factor: 20,
            shift_steps: 7,
            window_steps: 7,
        }
    }
}

impl AlignmentConfig {
    /// Number of candidate shifts in the upsampled domain.
    pub fn n_shifts(&self) -> usize {
        self.shift_steps * self.upsample_factor
    }

    /// Correlation window half-width in the upsampled domain.
    pub fn window(&self) -> usize {
        self.window_steps * self.upsample_factor
    }

    /// Validate all settings.
    pub fn validate(&self) -> ClusterResult<()> {
        if self.upsample_factor < 2 {
            return Err(ClusterError::invalid_param(
                "upsample_factor",
                self.upsample_factor,
                "upsampling below 2x cannot resolve sub-sample shifts",
            ));
        }
        if self.shift_steps == 0 || self.window_steps == 0 {
            return Err(ClusterError::invalid_param(
                "shift_steps/window_steps",
                format!("{}/{}", self.shift_steps, self.window_steps),
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Configuration of the stability-based splitting pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplittingConfig {
    /// Fixed channel universe scanned by the pipeline.
    pub n_channels: usize,

    /// Dimensionality of the variance-maximizing projection.
    pub n_pca_components: usize,

    /// How many amplitude-ranked channels enter the feature-channel set.
    pub n_amplitude_channels: usize,

    /// How many variability-ranked (MAD) channels enter the feature-channel
    /// set.
    pub n_mad_channels: usize,

    /// Peak-to-peak amplitude (signal units) a channel's mean waveform must
    /// exceed to be ranked by variability.
    pub amplitude_threshold: f32,

    /// Neighbour count of the aggregate kNN distance used for outlier
    /// triage.
    pub triage_neighbors: usize,

    /// Points whose aggregate kNN distance reaches this percentile are
    /// discarded as outliers.
    pub triage_percentile: f64,

    /// Mean responsibility a component must exceed for its points to be
    /// extracted as a finalized cluster.
    pub stability_threshold: f32,

    /// The refinement loop stops once this few points remain.
    pub min_remaining: usize,

    /// Hard cap on refinement iterations.
    pub max_iterations: usize,

    /// First sample (inclusive) of the aligned waveform window entering the
    /// projection.
    pub window_start: usize,

    /// Last sample (exclusive) of the aligned waveform window entering the
    /// projection.
    pub window_end: usize,

    /// Sub-sample alignment settings.
    pub alignment: AlignmentConfig,
}

impl Default for SplittingConfig {
    fn default() -> Self {
        Self {
            n_channels: 1,
            n_pca_components: 3,
            n_amplitude_channels: 3,
            n_mad_channels: 3,
            amplitude_threshold: 2.0,
            triage_neighbors: 11,
            triage_percentile: 90.0,
            stability_threshold: 0.90,
            min_remaining: 35,
            max_iterations: 1000,
            window_start: 0,
            window_end: 31,
            alignment: AlignmentConfig::default(),
        }
    }
}

impl SplittingConfig {
    /// Defaults for a probe with the given channel count.
    pub fn new(n_channels: usize) -> Self {
        Self {
            n_channels,
            ..Default::default()
        }
    }

    /// Validate all settings.
    pub fn validate(&self) -> ClusterResult<()> {
        if self.n_channels == 0 {
            return Err(ClusterError::invalid_param(
                "n_channels",
                self.n_channels,
                "at least one channel is required",
            ));
        }
        if self.n_pca_components == 0 {
            return Err(ClusterError::invalid_param(
                "n_pca_components",
                self.n_pca_components,
                "must be positive",
            ));
        }
        if self.n_amplitude_channels == 0 && self.n_mad_channels == 0 {
            return Err(ClusterError::invalid_param(
                "n_amplitude_channels/n_mad_channels",
                "0/0",
                "the feature-channel set would always be empty",
            ));
        }
        if self.triage_neighbors == 0 {
            return Err(ClusterError::invalid_param(
                "triage_neighbors",
                self.triage_neighbors,
                "must be positive",
            ));
        }
        if !(0.0..=100.0).contains(&self.triage_percentile) {
            return Err(ClusterError::invalid_param(
                "triage_percentile",
                self.triage_percentile,
                "must lie in [0, 100]",
            ));
        }
        if !(0.0..=1.0).contains(&self.stability_threshold) {
            return Err(ClusterError::invalid_param(
                "stability_threshold",
                self.stability_threshold,
                "must lie in [0, 1]",
            ));
        }
        if self.max_iterations == 0 {
            return Err(ClusterError::invalid_param(
                "max_iterations",
                self.max_iterations,
                "must be positive",
            ));
        }
        if self.window_start >= self.window_end {
            return Err(ClusterError::invalid_param(
                "window_start/window_end",
                format!("{}/{}", self.window_start, self.window_end),
                "window must be non-empty",
            ));
        }
        self.alignment.validate()
    }
}
