//! Core data model for the spike sorting engine.
//!
//! This crate defines the value types shared by the clustering and merge
//! engine: spike references and the final spike train, feature matrices,
//! waveform batches, recording parameters, mask/group assignments, the
//! component-indexed [`MixtureState`] aggregate, and the dense/sparse
//! responsibility relations with their boundary conversions.
//!
//! # Modules
//!
//! - [`error`]: Error types and result alias
//! - [`types`]: Spike references, features, waveforms, recording parameters
//! - [`mixture`]: Component-indexed mixture parameters
//! - [`responsibility`]: Dense and sparse responsibility relations

pub mod error;
pub mod mixture;
pub mod responsibility;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use mixture::MixtureState;
pub use responsibility::{DenseResponsibilities, ResponsibilityEntry, SparseResponsibilities};
pub use types::{
    ByteOrder, FeatureMatrix, MaskGroup, RecordingParams, SampleDtype, SpikeLabel, SpikeRef,
    SpikeTrain, WaveformBatch,
};
