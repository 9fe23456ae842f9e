//! Iterative stability-based cluster extraction.
//!
//! Each round fits the mixture on the current projected features, floors
//! and renormalizes responsibilities, and extracts every component whose
//! mean responsibility over its assigned points clears the stability
//! threshold (or, failing that, the single most stable component). The
//! survivors are re-aligned, re-projected and refitted. The loop stops at
//! the iteration cap, when too few points remain, or when a refit collapses
//! to a single component, which is extracted whole.

use tracing::{debug, warn};

use spike_sort_core::{FeatureMatrix, MaskGroup, WaveformBatch};

use crate::config::{ClusteringConfig, SplittingConfig};
use crate::error::ClusterResult;
use crate::fit::MixtureFitter;
use crate::split::build_aligned_features;
use crate::split::pca::project;

/// Mean responsibility of each component over its assigned points, paired
/// with those points' row indices. Components with no assigned points get
/// stability zero.
fn component_stability(
    responsibilities: &spike_sort_core::DenseResponsibilities,
) -> Vec<(f32, Vec<usize>)> {
    let k = responsibilities.n_components();
    let mut out = Vec::with_capacity(k);
    for component in 0..k {
        let mut assigned = Vec::new();
        let mut total = 0.0f64;
        for spike in 0..responsibilities.n_spikes() {
            let w = responsibilities.row(spike)[component];
            if w > 0.0 {
                assigned.push(spike);
                total += f64::from(w);
            }
        }
        let stability = if assigned.is_empty() {
            0.0
        } else {
            (total / assigned.len() as f64) as f32
        };
        out.push((stability, assigned));
    }
    out
}

/// Fit on the current features and post-process responsibilities the same
/// way the per-channel orchestrator does.
fn fit_once<F: MixtureFitter>(
    fitter: &F,
    features: &FeatureMatrix,
    config: &ClusteringConfig,
) -> ClusterResult<spike_sort_core::DenseResponsibilities> {
    let mask_group = MaskGroup::trivial(features.n_spikes());
    let fitted = fitter.fit(features, &mask_group, config)?;
    let mut responsibilities = fitted.responsibilities;
    responsibilities.threshold_and_renormalize(config.responsibility_floor);
    Ok(responsibilities)
}

/// Run the bounded extraction loop over one channel's triaged point set.
///
/// `waveforms` holds the triaged spikes; `initial_features` their
/// projection. Returned groups are row indices into that set; every point
/// appears in at most one group.
pub(crate) fn iterative_extraction<F: MixtureFitter>(
    fitter: &F,
    waveforms: &WaveformBatch,
    feature_channels: &[usize],
    initial_features: FeatureMatrix,
    split_config: &SplittingConfig,
    fit_config: &ClusteringConfig,
) -> ClusterResult<Vec<Vec<usize>>> {
    let mut working: Vec<usize> = (0..waveforms.n_spikes()).collect();
    let mut features = initial_features;
    let mut groups: Vec<Vec<usize>> = Vec::new();

    let mut responsibilities = fit_once(fitter, &features, fit_config)?;

    for iteration in 0..split_config.max_iterations {
        let stability = component_stability(&responsibilities);
        if stability.is_empty() {
            break;
        }

        // stable components extract together; otherwise the single most
        // stable one goes
        let mut chosen: Vec<usize> = stability
            .iter()
            .enumerate()
            .filter(|(_, (s, assigned))| {
                *s > split_config.stability_threshold && !assigned.is_empty()
            })
            .map(|(k, _)| k)
            .collect();
        if chosen.is_empty() {
            let best = stability
                .iter()
                .enumerate()
                .filter(|(_, (_, assigned))| !assigned.is_empty())
                .max_by(|(_, (a, _)), (_, (b, _))| {
                    a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(k, _)| k);
            match best {
                Some(k) => chosen.push(k),
                None => {
                    // nothing is assigned anywhere; the working set cannot
                    // shrink further
                    warn!(iteration, remaining = working.len(), "no assignable points left");
                    break;
                }
            }
        }

        // lower-indexed components claim shared points first
        let mut taken = vec![false; working.len()];
        for &component in &chosen {
            let rows: Vec<usize> = stability[component]
                .1
                .iter()
                .copied()
                .filter(|&row| !taken[row])
                .collect();
            if rows.is_empty() {
                continue;
            }
            for &row in &rows {
                taken[row] = true;
            }
            debug!(
                iteration,
                component,
                stability = stability[component].0,
                n_points = rows.len(),
                "extracting cluster"
            );
            groups.push(rows.iter().map(|&row| working[row]).collect());
        }

        let survivors: Vec<usize> = working
            .iter()
            .enumerate()
            .filter(|(row, _)| !taken[*row])
            .map(|(_, &point)| point)
            .collect();
        working = survivors;
        if working.len() <= split_config.min_remaining {
            debug!(remaining = working.len(), "too few points remain, stopping");
            break;
        }

        // re-align the survivors and project them afresh
        let remaining = waveforms.gather(&working);
        let aligned = build_aligned_features(&remaining, feature_channels, split_config)?;
        features = project(&aligned, split_config.n_pca_components)?;
        responsibilities = fit_once(fitter, &features, fit_config)?;

        if responsibilities.n_components() == 1 {
            debug!(remaining = working.len(), "single component remains, extracting");
            groups.push(working.clone());
            break;
        }
    }
    Ok(groups)
}
