//! End-to-end clustering scenario: several channels of well-separated
//! synthetic Gaussian clusters plus one channel with a single spike, driven
//! by a deterministic fitter.

use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

use spike_sort_cluster::{
    ChannelClusterer, ClusteringConfig, DenseResponsibilities, FeatureMatrix, FittedMixture,
    MaskGroup, MergeDecision, MergeEngine, MergeTest, MixtureFitter, MixtureState, SpikeRef,
};
use spike_sort_cluster::error::ClusterResult;

fn identity(dim: usize) -> Vec<f32> {
    let mut m = vec![0.0; dim * dim];
    for i in 0..dim {
        m[i * dim + i] = 1.0;
    }
    m
}

/// Deterministic two-means fitter: centroids seed at the extremes of the
/// first feature and refine with a fixed number of Lloyd iterations;
/// responsibilities are hard assignments. Unit covariance factors with unit
/// degrees of freedom make the merge gate an ordinary squared euclidean
/// distance.
struct TwoMeansFitter;

impl MixtureFitter for TwoMeansFitter {
    fn fit(
        &self,
        features: &FeatureMatrix,
        _mask_group: &MaskGroup,
        _config: &ClusteringConfig,
    ) -> ClusterResult<FittedMixture> {
        let n = features.n_spikes();
        let dim = features.n_features();

        let lo = (0..n)
            .min_by(|&a, &b| features.row(a)[0].partial_cmp(&features.row(b)[0]).unwrap())
            .unwrap();
        let hi = (0..n)
            .max_by(|&a, &b| features.row(a)[0].partial_cmp(&features.row(b)[0]).unwrap())
            .unwrap();
        let mut centroids = vec![features.row(lo).to_vec(), features.row(hi).to_vec()];

        let mut assignment = vec![0usize; n];
        for _ in 0..10 {
            for (s, slot) in assignment.iter_mut().enumerate() {
                let row = features.row(s);
                let d: Vec<f32> = centroids
                    .iter()
                    .map(|c| row.iter().zip(c).map(|(&x, &y)| (x - y).powi(2)).sum())
                    .collect();
                *slot = usize::from(d[1] < d[0]);
            }
            for (k, centroid) in centroids.iter_mut().enumerate() {
                let members: Vec<usize> =
                    (0..n).filter(|&s| assignment[s] == k).collect();
                if members.is_empty() {
                    continue;
                }
                for d in 0..dim {
                    centroid[d] = members.iter().map(|&s| features.row(s)[d]).sum::<f32>()
                        / members.len() as f32;
                }
            }
        }

        // drop an empty side so the state stays consistent
        let occupied: Vec<usize> = (0..2)
            .filter(|&k| assignment.iter().any(|&a| a == k))
            .collect();
        let mut state = MixtureState::empty(dim);
        for &k in &occupied {
            state
                .push_component(
                    centroids[k].clone(),
                    identity(dim),
                    identity(dim),
                    1.0,
                    1.0,
                    1.0,
                )
                .unwrap();
        }
        let rows: Vec<Vec<f32>> = assignment
            .iter()
            .map(|&a| {
                let mut row = vec![0.0; occupied.len()];
                row[occupied.iter().position(|&k| k == a).unwrap()] = 1.0;
                row
            })
            .collect();
        let responsibilities =
            DenseResponsibilities::from_rows(&rows, occupied.len()).unwrap();
        FittedMixture::new(state, responsibilities)
    }
}

struct RejectAll;

impl MergeTest for RejectAll {
    fn test_merge(
        &self,
        _features: &FeatureMatrix,
        _state: &MixtureState,
        _responsibilities: &DenseResponsibilities,
        _config: &ClusteringConfig,
    ) -> ClusterResult<MergeDecision> {
        Ok(MergeDecision::Rejected)
    }
}

fn gaussian(rng: &mut ChaCha8Rng, sigma: f32) -> f32 {
    // Box-Muller on two uniform draws
    let u1: f32 = rng.gen_range(1e-6f32..1.0);
    let u2: f32 = rng.gen_range(0.0f32..1.0);
    sigma * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
}

/// Three loaded channels with two well-separated Gaussian clusters each,
/// plus a fourth channel holding a single spike. Spike times are unique,
/// `time % 4` encodes the channel.
fn scenario() -> (FeatureMatrix, Vec<SpikeRef>) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut rows = Vec::new();
    let mut refs = Vec::new();
    for channel in 0..3usize {
        for cluster in 0..2usize {
            let centre = [
                20.0 * channel as f32 + 10.0 * cluster as f32,
                10.0 * cluster as f32,
            ];
            for point in 0..60usize {
                rows.push(vec![
                    centre[0] + gaussian(&mut rng, 0.4),
                    centre[1] + gaussian(&mut rng, 0.4),
                ]);
                let index = (channel * 120 + cluster * 60 + point) as u64;
                refs.push(SpikeRef::new(index * 4 + channel as u64, channel));
            }
        }
    }
    rows.push(vec![500.0, 500.0]);
    refs.push(SpikeRef::new(3, 3));
    (FeatureMatrix::from_rows(&rows).unwrap(), refs)
}

#[test]
fn end_to_end_cluster_and_merge() {
    let (features, refs) = scenario();
    let config = ClusteringConfig::new(4);
    let clusterer = ChannelClusterer::new(&TwoMeansFitter, &config);
    let mut global = clusterer.cluster(&features, &refs, None).unwrap().unwrap();

    // the 1-spike channel is skipped; each loaded channel yields exactly 2
    // components, 6 in total
    assert_eq!(global.n_components(), 6);
    assert_eq!(global.origin_channels, vec![0, 0, 1, 1, 2, 2]);
    assert_eq!(global.n_spikes(), 360);

    // every assigned spike's surviving responsibilities sum to 1
    for &spike in &global.responsibilities.assigned_spikes() {
        let sum: f32 = global
            .responsibilities
            .entries()
            .iter()
            .filter(|e| e.spike == spike)
            .map(|e| e.weight)
            .sum();
        assert!((sum - 1.0).abs() < 1e-5, "spike {} sums to {}", spike, sum);
    }

    // all centroids sit far apart, so the gate leaves nothing to test and
    // all 6 clusters survive consolidation
    let engine = MergeEngine::new(&RejectAll, &config);
    let stats = engine.consolidate(&mut global).unwrap();
    assert_eq!(stats.merges, 0);
    assert_eq!(global.n_components(), 6);

    // the spike train covers exactly the loaded channels' spikes, in time
    // order, under 6 distinct cluster ids
    let train = global.to_spike_train();
    assert_eq!(train.len(), 360);
    assert_eq!(train.cluster_ids().len(), 6);

    let mut expected_times: Vec<u64> = refs
        .iter()
        .filter(|r| r.channel < 3)
        .map(|r| r.time)
        .collect();
    expected_times.sort_unstable();
    let times: Vec<u64> = train.rows().iter().map(|r| r.time).collect();
    assert_eq!(times, expected_times);

    // labels respect channel boundaries: spikes from different channels
    // never share a cluster id
    for row in train.rows() {
        let channel = (row.time % 4) as usize;
        let origin = global.origin_channels[row.cluster];
        assert_eq!(channel, origin, "cluster {} crosses channels", row.cluster);
    }
}

#[test]
fn merge_consolidation_is_reproducible() {
    let (features, refs) = scenario();
    let config = ClusteringConfig::new(4);
    let clusterer = ChannelClusterer::new(&TwoMeansFitter, &config);

    let run = || {
        let mut global = clusterer.cluster(&features, &refs, None).unwrap().unwrap();
        let engine = MergeEngine::new(&RejectAll, &config);
        engine.consolidate(&mut global).unwrap();
        global.to_spike_train()
    };
    assert_eq!(run(), run());
}
