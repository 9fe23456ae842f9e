//! The responsibility relation linking spikes to mixture components.
//!
//! Two encodings exist with explicit conversions at defined boundaries: the
//! per-channel fit boundary works on a dense per-spike matrix, global
//! storage keeps only the surviving entries as a triplet list. A spike whose
//! dense row loses every entry to the floor is *unassigned*: its row stays
//! all-zero and it contributes no triplets. It is never handed full mass to
//! an arbitrary component.

use crate::error::{CoreError, CoreResult};

/// Dense responsibility matrix: one row per spike, one column per component.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseResponsibilities {
    values: Vec<f32>,
    n_spikes: usize,
    n_components: usize,
}

impl DenseResponsibilities {
    /// Wrap a flat row-major buffer.
    pub fn new(values: Vec<f32>, n_spikes: usize, n_components: usize) -> CoreResult<Self> {
        if values.len() != n_spikes * n_components {
            return Err(CoreError::length_mismatch(
                "responsibility buffer vs shape",
                values.len(),
                n_spikes * n_components,
            ));
        }
        Ok(Self {
            values,
            n_spikes,
            n_components,
        })
    }

    /// Build from per-spike rows.
    pub fn from_rows(rows: &[Vec<f32>], n_components: usize) -> CoreResult<Self> {
        let mut values = Vec::with_capacity(rows.len() * n_components);
        for row in rows {
            if row.len() != n_components {
                return Err(CoreError::DimensionMismatch {
                    expected: n_components,
                    actual: row.len(),
                });
            }
            values.extend_from_slice(row);
        }
        Self::new(values, rows.len(), n_components)
    }

    /// Number of spikes (rows).
    pub fn n_spikes(&self) -> usize {
        self.n_spikes
    }

    /// Number of components (columns).
    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// One spike's responsibility row.
    pub fn row(&self, spike: usize) -> &[f32] {
        let start = spike * self.n_components;
        &self.values[start..start + self.n_components]
    }

    /// Sum of one spike's row.
    pub fn row_sum(&self, spike: usize) -> f32 {
        self.row(spike).iter().sum()
    }

    /// Zero every entry below `floor`, then renormalize each row over its
    /// surviving entries. Rows with no survivors are left all-zero: the
    /// spike is unassigned, not an error and not a division fault.
    pub fn threshold_and_renormalize(&mut self, floor: f32) {
        for spike in 0..self.n_spikes {
            let start = spike * self.n_components;
            let row = &mut self.values[start..start + self.n_components];
            for v in row.iter_mut() {
                if *v < floor {
                    *v = 0.0;
                }
            }
            let sum: f32 = row.iter().sum();
            if sum > 0.0 {
                for v in row.iter_mut() {
                    *v /= sum;
                }
            }
        }
    }

    /// Total responsibility mass per component (column sums).
    pub fn column_masses(&self) -> Vec<f32> {
        let mut masses = vec![0.0f32; self.n_components];
        for row in self.values.chunks_exact(self.n_components.max(1)) {
            for (mass, &v) in masses.iter_mut().zip(row) {
                *mass += v;
            }
        }
        masses
    }

    /// Keep only the listed columns, in the given order, copying into a new
    /// matrix.
    pub fn retain_components(&self, keep: &[usize]) -> Self {
        let mut values = Vec::with_capacity(self.n_spikes * keep.len());
        for spike in 0..self.n_spikes {
            let row = self.row(spike);
            for &k in keep {
                values.push(row[k]);
            }
        }
        Self {
            values,
            n_spikes: self.n_spikes,
            n_components: keep.len(),
        }
    }
}

/// One surviving (spike, component, weight) entry of the sparse relation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponsibilityEntry {
    /// Global spike id.
    pub spike: usize,
    /// Global component id.
    pub component: usize,
    /// Responsibility mass in `(0, 1]`.
    pub weight: f32,
}

/// Sparse triplet encoding of the responsibility relation, used for global
/// storage after per-channel folds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseResponsibilities {
    entries: Vec<ResponsibilityEntry>,
}

impl SparseResponsibilities {
    /// Convert a dense matrix, keeping only strictly positive entries in
    /// row-major order.
    pub fn from_dense(dense: &DenseResponsibilities) -> Self {
        let mut entries = Vec::new();
        for spike in 0..dense.n_spikes() {
            for (component, &weight) in dense.row(spike).iter().enumerate() {
                if weight > 0.0 {
                    entries.push(ResponsibilityEntry {
                        spike,
                        component,
                        weight,
                    });
                }
            }
        }
        Self { entries }
    }

    /// The raw entries.
    pub fn entries(&self) -> &[ResponsibilityEntry] {
        &self.entries
    }

    /// Number of stored triplets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the relation is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shift every spike id and component id by the given offsets. Used when
    /// folding a channel's local relation into the global one.
    pub fn offset_ids(&mut self, spike_offset: usize, component_offset: usize) {
        for e in &mut self.entries {
            e.spike += spike_offset;
            e.component += component_offset;
        }
    }

    /// Append another relation's entries.
    pub fn append(&mut self, other: SparseResponsibilities) {
        self.entries.extend(other.entries);
    }

    /// Total mass assigned to one component.
    pub fn column_mass(&self, component: usize) -> f32 {
        self.entries
            .iter()
            .filter(|e| e.component == component)
            .map(|e| e.weight)
            .sum()
    }

    /// Total mass over all entries.
    pub fn total_mass(&self) -> f32 {
        self.entries.iter().map(|e| e.weight).sum()
    }

    /// Sorted, deduplicated spike ids carrying nonzero mass under any of the
    /// given components.
    pub fn spikes_of_any(&self, components: &[usize]) -> Vec<usize> {
        let mut spikes: Vec<usize> = self
            .entries
            .iter()
            .filter(|e| components.contains(&e.component))
            .map(|e| e.spike)
            .collect();
        spikes.sort_unstable();
        spikes.dedup();
        spikes
    }

    /// Sorted, deduplicated spike ids present in the relation.
    pub fn assigned_spikes(&self) -> Vec<usize> {
        let mut spikes: Vec<usize> = self.entries.iter().map(|e| e.spike).collect();
        spikes.sort_unstable();
        spikes.dedup();
        spikes
    }

    /// Gather a dense sub-matrix: rows are the given spikes (in order),
    /// columns the given components (in order). This is the sparse-to-dense
    /// boundary crossing used to build local merge sub-problems.
    pub fn local_dense(
        &self,
        spikes: &[usize],
        components: &[usize],
    ) -> CoreResult<DenseResponsibilities> {
        let mut values = vec![0.0f32; spikes.len() * components.len()];
        for e in &self.entries {
            let Some(r) = spikes.iter().position(|&s| s == e.spike) else {
                continue;
            };
            let Some(c) = components.iter().position(|&k| k == e.component) else {
                continue;
            };
            values[r * components.len() + c] += e.weight;
        }
        DenseResponsibilities::new(values, spikes.len(), components.len())
    }

    /// Apply a merge of component `kb` into component `ka` (`ka < kb`):
    /// entries of either component are replaced by per-spike summed entries
    /// under `ka`, and every component id above `kb` is decremented to close
    /// the gap left by the deleted component.
    pub fn merge_components(&mut self, ka: usize, kb: usize) {
        debug_assert!(ka < kb);
        let mut merged: Vec<(usize, f32)> = Vec::new();
        self.entries.retain(|e| {
            if e.component == ka || e.component == kb {
                match merged.binary_search_by_key(&e.spike, |&(s, _)| s) {
                    Ok(i) => merged[i].1 += e.weight,
                    Err(i) => merged.insert(i, (e.spike, e.weight)),
                }
                false
            } else {
                true
            }
        });
        for e in &mut self.entries {
            if e.component > kb {
                e.component -= 1;
            }
        }
        for (spike, weight) in merged {
            self.entries.push(ResponsibilityEntry {
                spike,
                component: ka,
                weight,
            });
        }
    }

    /// Hard assignment per spike: the component with the largest weight,
    /// ties broken toward the lower component id. Returned pairs are sorted
    /// by spike id. Unassigned spikes are absent.
    pub fn argmax_assignments(&self) -> Vec<(usize, usize)> {
        let mut best: Vec<(usize, usize, f32)> = Vec::new();
        for e in &self.entries {
            match best.binary_search_by_key(&e.spike, |&(s, _, _)| s) {
                Ok(i) => {
                    let (_, comp, weight) = best[i];
                    if e.weight > weight || (e.weight == weight && e.component < comp) {
                        best[i] = (e.spike, e.component, e.weight);
                    }
                }
                Err(i) => best.insert(i, (e.spike, e.component, e.weight)),
            }
        }
        best.into_iter().map(|(s, c, _)| (s, c)).collect()
    }
}
