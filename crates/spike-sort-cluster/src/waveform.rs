//! Waveform loading from the standardized binary recording.
//!
//! The recording is a dense `[frame][channel]` sample stream. Segments are
//! read in fixed-duration time chunks with an overlap buffer on both sides
//! so windows spanning a chunk boundary stay whole; chunk workers are
//! stateless, read-only and fan out in parallel. Windows that run past
//! either end of the file are zero-padded, never an error.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::debug;

use spike_sort_core::{ByteOrder, RecordingParams, SampleDtype, SpikeRef, WaveformBatch};

use crate::config::LoaderConfig;
use crate::error::{ClusterError, ClusterResult};

/// Source of spike waveform segments.
pub trait WaveformLoader: Send + Sync {
    /// Load one segment of `2 * half_window + 1` samples around each
    /// reference's spike time, all channels.
    fn load(&self, refs: &[SpikeRef], half_window: usize) -> ClusterResult<WaveformBatch>;
}

/// Chunked reader over an on-disk standardized recording.
#[derive(Debug, Clone)]
pub struct RecordingReader {
    path: PathBuf,
    params: RecordingParams,
    config: LoaderConfig,
}

impl RecordingReader {
    /// Create a reader for the given recording file and parameters.
    pub fn new(
        path: impl AsRef<Path>,
        params: RecordingParams,
        config: LoaderConfig,
    ) -> ClusterResult<Self> {
        config.validate()?;
        if params.n_channels == 0 {
            return Err(ClusterError::invalid_param(
                "n_channels",
                params.n_channels,
                "the recording must have at least one channel",
            ));
        }
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            params,
            config,
        })
    }

    /// Total frames in the recording file.
    fn n_frames(&self) -> ClusterResult<u64> {
        let bytes = std::fs::metadata(&self.path)?.len();
        Ok(bytes / self.params.frame_bytes() as u64)
    }

    /// Read `n_frames` frames starting at `first_frame` (which may be
    /// negative or past the end); out-of-bounds frames come back as zeros.
    fn read_padded(&self, first_frame: i64, n_frames: usize, total: u64) -> ClusterResult<Vec<f32>> {
        let n_channels = self.params.n_channels;
        let mut out = vec![0.0f32; n_frames * n_channels];

        let in_start = first_frame.max(0) as u64;
        let in_end = ((first_frame + n_frames as i64).max(0) as u64).min(total);
        if in_start >= in_end {
            return Ok(out);
        }

        let frame_bytes = self.params.frame_bytes();
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(in_start * frame_bytes as u64))?;
        let mut raw = vec![0u8; (in_end - in_start) as usize * frame_bytes];
        file.read_exact(&mut raw)?;

        let dst_offset = (in_start as i64 - first_frame) as usize * n_channels;
        let dst = &mut out[dst_offset..dst_offset + (in_end - in_start) as usize * n_channels];
        decode_samples(&raw, self.params.dtype, self.params.byte_order, dst);
        Ok(out)
    }
}

/// Decode raw sample bytes into `f32`.
fn decode_samples(raw: &[u8], dtype: SampleDtype, order: ByteOrder, dst: &mut [f32]) {
    match dtype {
        SampleDtype::Float32 => {
            for (v, chunk) in dst.iter_mut().zip(raw.chunks_exact(4)) {
                let bytes = [chunk[0], chunk[1], chunk[2], chunk[3]];
                *v = match order {
                    ByteOrder::Little => f32::from_le_bytes(bytes),
                    ByteOrder::Big => f32::from_be_bytes(bytes),
                };
            }
        }
        SampleDtype::Int16 => {
            for (v, chunk) in dst.iter_mut().zip(raw.chunks_exact(2)) {
                let bytes = [chunk[0], chunk[1]];
                let sample = match order {
                    ByteOrder::Little => i16::from_le_bytes(bytes),
                    ByteOrder::Big => i16::from_be_bytes(bytes),
                };
                *v = f32::from(sample);
            }
        }
    }
}

impl WaveformLoader for RecordingReader {
    fn load(&self, refs: &[SpikeRef], half_window: usize) -> ClusterResult<WaveformBatch> {
        let n_channels = self.params.n_channels;
        let n_samples = 2 * half_window + 1;
        let total = self.n_frames()?;
        let chunk_frames =
            (self.params.sample_rate_hz as u64 * self.config.chunk_seconds as u64).max(1);
        let buffer = self.config.buffer_frames.max(half_window) as i64;

        // Partition the spikes by chunk; times at or past the end of the
        // file land in a virtual tail chunk and come back zero-padded.
        let n_chunks = (total / chunk_frames + 1) as usize;
        let mut per_chunk: Vec<Vec<usize>> = vec![Vec::new(); n_chunks];
        for (i, r) in refs.iter().enumerate() {
            let chunk = ((r.time / chunk_frames) as usize).min(n_chunks - 1);
            per_chunk[chunk].push(i);
        }
        debug!(
            n_refs = refs.len(),
            n_chunks,
            total_frames = total,
            "loading waveform segments"
        );

        let frame = n_samples * n_channels;
        let chunk_results: Vec<Vec<(usize, Vec<f32>)>> = per_chunk
            .par_iter()
            .enumerate()
            .filter(|(_, spikes)| !spikes.is_empty())
            .map(|(chunk, spikes)| {
                let chunk_start = chunk as i64 * chunk_frames as i64;
                let read_start = chunk_start - buffer;
                let read_frames = chunk_frames as usize + 2 * buffer as usize;
                let data = self.read_padded(read_start, read_frames, total)?;

                let mut out = Vec::with_capacity(spikes.len());
                for &i in spikes {
                    let centre = refs[i].time as i64 - read_start;
                    let mut segment = vec![0.0f32; frame];
                    for (s, offset) in (-(half_window as i64)..=half_window as i64).enumerate() {
                        let fi = centre + offset;
                        if fi < 0 || fi >= read_frames as i64 {
                            continue;
                        }
                        let src = fi as usize * n_channels;
                        segment[s * n_channels..(s + 1) * n_channels]
                            .copy_from_slice(&data[src..src + n_channels]);
                    }
                    out.push((i, segment));
                }
                Ok(out)
            })
            .collect::<ClusterResult<Vec<_>>>()?;

        // Stitch back in input order.
        let mut values = vec![0.0f32; refs.len() * frame];
        for (i, segment) in chunk_results.into_iter().flatten() {
            values[i * frame..(i + 1) * frame].copy_from_slice(&segment);
        }
        Ok(WaveformBatch::new(values, refs.len(), n_samples, n_channels)?)
    }
}
