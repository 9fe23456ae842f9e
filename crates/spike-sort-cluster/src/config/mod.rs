//! Engine configuration.
//!
//! Every recognized option of the clustering, merging, splitting and
//! loading stages lives here as an immutable, serde round-trippable struct
//! with validated defaults. Configuration is passed by reference; nothing
//! in the engine mutates it.

mod clustering;
mod loader;
mod splitting;

pub use clustering::ClusteringConfig;
pub use loader::LoaderConfig;
pub use splitting::{AlignmentConfig, SplittingConfig};

use serde::{Deserialize, Serialize};

use crate::error::ClusterResult;

/// Top-level configuration aggregating every stage's settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SortConfig {
    /// Per-channel clustering and merge settings.
    pub clustering: ClusteringConfig,
    /// Stability-based splitting settings.
    pub splitting: SplittingConfig,
    /// Chunked waveform loading settings.
    pub loader: LoaderConfig,
}

impl SortConfig {
    /// Defaults for a probe with the given channel count, applied to both
    /// pipelines.
    pub fn new(n_channels: usize) -> Self {
        Self {
            clustering: ClusteringConfig::new(n_channels),
            splitting: SplittingConfig::new(n_channels),
            loader: LoaderConfig::default(),
        }
    }

    /// Validate every stage's settings.
    pub fn validate(&self) -> ClusterResult<()> {
        self.clustering.validate()?;
        self.splitting.validate()?;
        self.loader.validate()
    }
}
