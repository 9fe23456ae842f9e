//! Engine error types.

use spike_sort_core::CoreError;
use thiserror::Error;

/// Errors raised by the clustering and merge engine.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Feature rows and spike references must be indexed in lockstep.
    #[error("feature rows ({features}) do not match spike references ({spikes})")]
    FeatureSpikeMismatch {
        /// Number of feature rows
        features: usize,
        /// Number of spike references
        spikes: usize,
    },

    /// A spike referenced a channel outside the configured universe.
    #[error("channel {channel} is out of range for a {n_channels}-channel configuration")]
    ChannelOutOfRange {
        /// Offending channel index
        channel: usize,
        /// Configured channel count
        n_channels: usize,
    },

    /// A configuration value failed validation.
    #[error("invalid parameter '{name}': {value}. {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Offending value, rendered as a string
        value: String,
        /// Why the value is invalid
        reason: String,
    },

    /// The mixture-fitting collaborator failed or returned an inconsistent
    /// result.
    #[error("mixture fit failed: {0}")]
    Fit(String),

    /// The merge-test collaborator failed. At the engine level this is
    /// downgraded to a rejection of the attempted merge.
    #[error("merge test failed: {0}")]
    MergeTest(String),

    /// The waveform alignment window does not fit the upsampled traces.
    #[error("alignment window ({window} upsampled steps, {shifts} shifts) exceeds trace of {len} upsampled samples")]
    AlignmentWindow {
        /// Correlation window half-width in upsampled steps
        window: usize,
        /// Number of candidate shifts
        shifts: usize,
        /// Upsampled trace length
        len: usize,
    },

    /// An operation received no data to work on.
    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    /// Error from the core data model.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// I/O error while reading the standardized recording.
    #[error("recording io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

impl ClusterError {
    /// Create an `InvalidParameter` error.
    pub fn invalid_param(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        ClusterError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_spike_mismatch_display() {
        let err = ClusterError::FeatureSpikeMismatch {
            features: 10,
            spikes: 8,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("10"));
        assert!(msg.contains("8"));
    }

    #[test]
    fn test_invalid_param_helper() {
        let err = ClusterError::invalid_param("responsibility_floor", 1.5, "must lie in (0, 1)");
        let msg = format!("{}", err);
        assert!(msg.contains("responsibility_floor"));
        assert!(msg.contains("1.5"));
        assert!(msg.contains("(0, 1)"));
    }

    #[test]
    fn test_core_error_converts() {
        let core = CoreError::EmptyInput("feature rows");
        let err: ClusterError = core.into();
        assert!(matches!(err, ClusterError::Core(_)));
    }
}
