//! Spike references and the final spike train.

use serde::{Deserialize, Serialize};

/// Reference to one detected spike: its time (in samples) and the channel
/// whose amplitude was maximal at detection. Unique per detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpikeRef {
    /// Sample index of the spike in the source recording.
    pub time: u64,
    /// Main channel of the spike.
    pub channel: usize,
}

impl SpikeRef {
    /// Create a new spike reference.
    pub fn new(time: u64, channel: usize) -> Self {
        Self { time, channel }
    }
}

/// One row of the final output: a spike time labeled with its cluster id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpikeLabel {
    /// Sample index of the spike.
    pub time: u64,
    /// Cluster id assigned to the spike. Ids are unique per cluster but
    /// carry no contiguity guarantee.
    pub cluster: usize,
}

/// Final ordered sequence of labeled spikes, sorted ascending by time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpikeTrain {
    rows: Vec<SpikeLabel>,
}

impl SpikeTrain {
    /// Build a spike train from unordered rows. Rows are sorted by time,
    /// ties broken by cluster id so the ordering is deterministic.
    pub fn from_rows(mut rows: Vec<SpikeLabel>) -> Self {
        rows.sort_by_key(|r| (r.time, r.cluster));
        Self { rows }
    }

    /// The labeled rows in ascending time order.
    pub fn rows(&self) -> &[SpikeLabel] {
        &self.rows
    }

    /// Number of labeled spikes.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the train holds no spikes.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sorted, deduplicated list of cluster ids present in the train.
    pub fn cluster_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.rows.iter().map(|r| r.cluster).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_sorts_by_time() {
        let train = SpikeTrain::from_rows(vec![
            SpikeLabel { time: 30, cluster: 0 },
            SpikeLabel { time: 10, cluster: 1 },
            SpikeLabel { time: 20, cluster: 0 },
        ]);
        let times: Vec<u64> = train.rows().iter().map(|r| r.time).collect();
        assert_eq!(times, vec![10, 20, 30]);
    }

    #[test]
    fn test_cluster_ids_sorted_unique() {
        let train = SpikeTrain::from_rows(vec![
            SpikeLabel { time: 1, cluster: 7 },
            SpikeLabel { time: 2, cluster: 2 },
            SpikeLabel { time: 3, cluster: 7 },
        ]);
        assert_eq!(train.cluster_ids(), vec![2, 7]);
    }

    #[test]
    fn test_tie_break_is_deterministic() {
        let a = SpikeTrain::from_rows(vec![
            SpikeLabel { time: 5, cluster: 1 },
            SpikeLabel { time: 5, cluster: 0 },
        ]);
        let b = SpikeTrain::from_rows(vec![
            SpikeLabel { time: 5, cluster: 0 },
            SpikeLabel { time: 5, cluster: 1 },
        ]);
        assert_eq!(a, b);
    }
}
