//! Value types shared across the sorting pipeline.

mod features;
mod mask;
mod recording;
mod spike;
mod waveform;

pub use features::FeatureMatrix;
pub use mask::MaskGroup;
pub use recording::{ByteOrder, RecordingParams, SampleDtype};
pub use spike::{SpikeLabel, SpikeRef, SpikeTrain};
pub use waveform::WaveformBatch;
