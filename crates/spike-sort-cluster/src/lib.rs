//! Clustering and merge engine for neural spike sorting.
//!
//! Detected spikes arrive as per-spike feature vectors tagged with a
//! `(time, channel)` reference. The engine offers two routes to a labeled
//! spike train:
//!
//! - the **clustering path**: one variational mixture fit per channel
//!   ([`channel`]), responsibilities floored and renormalized, near-empty
//!   components pruned ([`prune`]), the per-channel results folded into one
//!   globally indexed collection ([`aggregate`]) and consolidated by the
//!   Mahalanobis-gated greedy merge engine ([`merge`], [`mahalanobis`]);
//! - the **splitting path** ([`split`]): per-channel feature engineering
//!   straight from waveforms (channel selection, sub-sample alignment,
//!   projection, outlier triage) followed by iterative stability-based
//!   cluster extraction.
//!
//! The variational primitives themselves are collaborators behind the
//! [`fit::MixtureFitter`] and [`fit::MergeTest`] seams; waveform access
//! goes through [`waveform::WaveformLoader`], with a chunked binary reader
//! provided.

pub mod aggregate;
pub mod channel;
pub mod config;
pub mod error;
pub mod fit;
pub mod mahalanobis;
pub mod merge;
pub mod prune;
pub mod split;
pub mod waveform;

pub use aggregate::{ChannelContribution, GlobalAccumulator, GlobalClusters};
pub use channel::ChannelClusterer;
pub use config::{AlignmentConfig, ClusteringConfig, LoaderConfig, SortConfig, SplittingConfig};
pub use error::{ClusterError, ClusterResult};
pub use fit::{FittedMixture, MergeDecision, MergeTest, MixtureFitter};
pub use mahalanobis::DistanceMatrix;
pub use merge::{MergeEngine, MergeStats};
pub use prune::prune_empty_components;
pub use split::{SplitOutput, SplittingPipeline};
pub use waveform::{RecordingReader, WaveformLoader};

// Core data-model types, re-exported for downstream convenience.
pub use spike_sort_core::{
    DenseResponsibilities, FeatureMatrix, MaskGroup, MixtureState, RecordingParams,
    SparseResponsibilities, SpikeLabel, SpikeRef, SpikeTrain, WaveformBatch,
};
