//! Sub-sample waveform alignment.
//!
//! Every trace is upsampled by bandlimited interpolation, cross-correlated
//! against the equally upsampled mean template inside a symmetric window
//! around the centre, and resampled back at the best integer shift in the
//! upsampled domain. Tails truncated by the shift are zero-padded. The whole
//! batch shares one template, so traces align to each other rather than to
//! an absolute position.

use rustfft::{num_complex::Complex, FftPlanner};

use crate::config::AlignmentConfig;
use crate::error::{ClusterError, ClusterResult};

/// Bandlimited resampling by spectrum zero-padding. Only upsampling is
/// supported (`target_len >= x.len()`).
pub(crate) fn resample(x: &[f32], target_len: usize) -> Vec<f32> {
    let n = x.len();
    debug_assert!(target_len >= n);
    if n == 0 || target_len == n {
        return x.to_vec();
    }

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    let mut buf: Vec<Complex<f64>> = x
        .iter()
        .map(|&v| Complex::new(f64::from(v), 0.0))
        .collect();
    fft.process(&mut buf);

    let mut spec = vec![Complex::new(0.0, 0.0); target_len];
    let half = n / 2;
    if n % 2 == 0 {
        spec[..half].copy_from_slice(&buf[..half]);
        // split the Nyquist bin across both symmetric positions
        let nyquist = buf[half] * 0.5;
        spec[half] = nyquist;
        spec[target_len - half] = nyquist;
        for k in (half + 1)..n {
            spec[target_len - n + k] = buf[k];
        }
    } else {
        spec[..=half].copy_from_slice(&buf[..=half]);
        for k in (half + 1)..n {
            spec[target_len - n + k] = buf[k];
        }
    }

    let ifft = planner.plan_fft_inverse(target_len);
    ifft.process(&mut spec);
    // the inverse transform is unnormalized; dividing by the input length
    // preserves amplitude
    spec.iter().map(|c| (c.re / n as f64) as f32).collect()
}

/// Align every trace of one channel to the batch's mean template.
///
/// All traces must share one length. Returns the aligned traces at the
/// original rate, zero-padded where the shift truncates them.
pub fn align_channel_waveforms(
    traces: &[Vec<f32>],
    config: &AlignmentConfig,
) -> ClusterResult<Vec<Vec<f32>>> {
    let Some(first) = traces.first() else {
        return Ok(Vec::new());
    };
    let len = first.len();
    if len == 0 {
        return Err(ClusterError::EmptyInput("waveform traces"));
    }
    for trace in traces {
        if trace.len() != len {
            return Err(ClusterError::Core(
                spike_sort_core::CoreError::DimensionMismatch {
                    expected: len,
                    actual: trace.len(),
                },
            ));
        }
    }

    let factor = config.upsample_factor;
    let up_len = len * factor;
    let n_shifts = config.n_shifts();
    let window = config.window();
    let centre = up_len / 2;
    if centre < window + n_shifts / 2 || centre + window + n_shifts / 2 > up_len {
        return Err(ClusterError::AlignmentWindow {
            window,
            shifts: n_shifts,
            len: up_len,
        });
    }

    // one template for the whole batch
    let mut template = vec![0.0f32; len];
    for trace in traces {
        for (t, &v) in template.iter_mut().zip(trace) {
            *t += v;
        }
    }
    for t in &mut template {
        *t /= traces.len() as f32;
    }
    let template_up = resample(&template, up_len);

    let half_shifts = (n_shifts / 2) as i64;
    let shifted_templates: Vec<&[f32]> = (-half_shifts..=half_shifts)
        .map(|s| {
            let start = (centre as i64 - window as i64 + s) as usize;
            &template_up[start..start + 2 * window]
        })
        .collect();

    let mut aligned = Vec::with_capacity(traces.len());
    for trace in traces {
        let up = resample(trace, up_len);
        let segment = &up[centre - window..centre + window];

        let mut best_shift = 0usize;
        let mut best_score = f64::NEG_INFINITY;
        for (shift, template_slice) in shifted_templates.iter().enumerate() {
            let score: f64 = segment
                .iter()
                .zip(template_slice.iter())
                .map(|(&a, &b)| f64::from(a) * f64::from(b))
                .sum();
            if score > best_score {
                best_score = score;
                best_shift = shift;
            }
        }

        let start = n_shifts - best_shift;
        let mut out: Vec<f32> = up[start..].iter().step_by(factor).take(len).copied().collect();
        out.resize(len, 0.0);
        aligned.push(out);
    }
    Ok(aligned)
}
