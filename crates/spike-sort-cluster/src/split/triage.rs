//! Outlier triage on projected features.
//!
//! Each point's aggregate distance to its k nearest neighbours (itself
//! included, mirroring a tree query that returns the query point at
//! distance zero) ranks it; the worst tail above the configured percentile
//! is discarded as noise.

use spike_sort_core::FeatureMatrix;

/// Aggregate kNN distance per point: the sum of the `k` smallest euclidean
/// distances from the point to the whole set, the zero self-distance
/// included.
pub fn knn_distance_sums(points: &FeatureMatrix, k: usize) -> Vec<f32> {
    let n = points.n_spikes();
    let mut sums = Vec::with_capacity(n);
    for i in 0..n {
        let a = points.row(i);
        let mut distances: Vec<f64> = (0..n)
            .map(|j| {
                let b = points.row(j);
                a.iter()
                    .zip(b)
                    .map(|(&x, &y)| {
                        let d = f64::from(x) - f64::from(y);
                        d * d
                    })
                    .sum::<f64>()
                    .sqrt()
            })
            .collect();
        distances.sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));
        let take = k.min(n);
        sums.push(distances[..take].iter().sum::<f64>() as f32);
    }
    sums
}

/// Linear-interpolated percentile of the given values, `pct` in `[0, 100]`.
pub fn percentile(values: &[f32], pct: f64) -> f32 {
    debug_assert!(!values.is_empty());
    let mut sorted: Vec<f32> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = (sorted.len() - 1) as f64 * pct / 100.0;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = (rank - lo as f64) as f32;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

/// Indices of the points retained by the triage: aggregate distance
/// strictly below the percentile cutoff. Order is preserved.
pub fn triage_outliers(points: &FeatureMatrix, k: usize, pct: f64) -> Vec<usize> {
    let n = points.n_spikes();
    if n == 0 {
        return Vec::new();
    }
    let sums = knn_distance_sums(points, k);
    let cutoff = percentile(&sums, pct);
    (0..n).filter(|&i| sums[i] < cutoff).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let values = vec![0.0, 1.0, 2.0, 3.0];
        assert_eq!(percentile(&values, 0.0), 0.0);
        assert_eq!(percentile(&values, 100.0), 3.0);
        assert!((percentile(&values, 50.0) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_self_distance_contributes_zero() {
        let points =
            FeatureMatrix::from_rows(&[vec![0.0, 0.0], vec![3.0, 4.0]]).unwrap();
        let sums = knn_distance_sums(&points, 2);
        // each point: self (0) plus the other at distance 5
        assert!((sums[0] - 5.0).abs() < 1e-5);
        assert!((sums[1] - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_triage_drops_the_far_tail() {
        // a tight cloud of 19 points plus one far outlier
        let mut rows: Vec<Vec<f32>> = (0..19)
            .map(|i| vec![(i % 5) as f32 * 0.01, (i / 5) as f32 * 0.01])
            .collect();
        rows.push(vec![100.0, 100.0]);
        let points = FeatureMatrix::from_rows(&rows).unwrap();

        let kept = triage_outliers(&points, 5, 90.0);
        assert!(!kept.contains(&19), "outlier survived triage");
        assert!(kept.len() >= 17);
        // order preserved
        let mut sorted = kept.clone();
        sorted.sort_unstable();
        assert_eq!(kept, sorted);
    }

    #[test]
    fn test_triage_empty_input() {
        let points = FeatureMatrix::empty(2);
        assert!(triage_outliers(&points, 11, 90.0).is_empty());
    }
}
