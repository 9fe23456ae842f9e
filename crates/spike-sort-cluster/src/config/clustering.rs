//! Settings for the per-channel clustering and merge path.

use serde::{Deserialize, Serialize};

use crate::error::{ClusterError, ClusterResult};

/// Configuration of the per-channel clustering orchestrator and the merge
/// engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Number of channels of the probe. Spike references must stay below
    /// this bound.
    pub n_channels: usize,

    /// Minimum total responsibility mass a component must exceed to survive
    /// pruning after a channel fit.
    pub min_cluster_mass: f32,

    /// Responsibility entries below this floor are zeroed before rows are
    /// renormalized.
    pub responsibility_floor: f32,

    /// Squared Mahalanobis gate: a component pair is a merge candidate when
    /// either directional distance falls below this value.
    pub merge_distance_gate: f32,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            n_channels: 1,
            min_cluster_mass: 20.0,
            responsibility_floor: 0.1,
            merge_distance_gate: 15.0,
        }
    }
}

impl ClusteringConfig {
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
        if !(0.0..1.0).contains(&self.responsibility_floor) {
            return Err(ClusterError::invalid_param(
                "responsibility_floor",
                self.responsibility_floor,
                "must lie in [0, 1)",
            ));
        }
        if !self.merge_distance_gate.is_finite() || self.merge_distance_gate <= 0.0 {
            return Err(ClusterError::invalid_param(
                "merge_distance_gate",
                self.merge_distance_gate,
                "must be positive and finite",
            ));
        }
        if !self.min_cluster_mass.is_finite() || self.min_cluster_mass < 0.0 {
            return Err(ClusterError::invalid_param(
                "min_cluster_mass",
                self.min_cluster_mass,
                "must be non-negative and finite",
            ));
        }
        Ok(())
    }
}
