//! Companion parameters of the standardized binary recording.

use serde::{Deserialize, Serialize};

/// On-disk sample encoding of the standardized recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SampleDtype {
    /// 32-bit IEEE float, the standardized pipeline output.
    #[default]
    Float32,
    /// 16-bit signed integer, converted to float on read.
    Int16,
}

impl SampleDtype {
    /// Bytes per sample.
    pub fn size(&self) -> usize {
        match self {
            SampleDtype::Float32 => 4,
            SampleDtype::Int16 => 2,
        }
    }
}

/// Byte order of the recording file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Little endian.
    #[default]
    Little,
    /// Big endian.
    Big,
}

/// Parameter record accompanying the standardized binary recording.
///
/// The recording itself is a dense `[frame][channel]` sample stream; these
/// parameters are everything needed to index into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingParams {
    /// Number of recording channels per frame.
    pub n_channels: usize,
    /// Sampling rate in Hz.
    pub sample_rate_hz: u32,
    /// Sample encoding.
    #[serde(default)]
    pub dtype: SampleDtype,
    /// Byte order.
    #[serde(default)]
    pub byte_order: ByteOrder,
}

impl RecordingParams {
    /// Create parameters for a float32 little-endian recording.
    pub fn new(n_channels: usize, sample_rate_hz: u32) -> Self {
        Self {
            n_channels,
            sample_rate_hz,
            dtype: SampleDtype::default(),
            byte_order: ByteOrder::default(),
        }
    }

    /// Bytes occupied by one frame (all channels of one sample instant).
    pub fn frame_bytes(&self) -> usize {
        self.n_channels * self.dtype.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_bytes() {
        let params = RecordingParams::new(49, 20_000);
        assert_eq!(params.frame_bytes(), 49 * 4);

        let mut i16_params = params.clone();
        i16_params.dtype = SampleDtype::Int16;
        assert_eq!(i16_params.frame_bytes(), 49 * 2);
    }

    #[test]
    fn test_serde_roundtrip_with_defaults() {
        let json = r#"{"n_channels": 4, "sample_rate_hz": 30000}"#;
        let params: RecordingParams = serde_json::from_str(json).unwrap();
        assert_eq!(params.dtype, SampleDtype::Float32);
        assert_eq!(params.byte_order, ByteOrder::Little);

        let back = serde_json::to_string(&params).unwrap();
        let again: RecordingParams = serde_json::from_str(&back).unwrap();
        assert_eq!(params, again);
    }
}
