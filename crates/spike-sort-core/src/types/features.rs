//! Flat row-major feature storage, one row per spike.

use crate::error::{CoreError, CoreResult};

/// Numeric projections of spike waveforms, one fixed-width row per spike.
///
/// Storage is a single flat buffer; rows are contiguous. Subsetting via
/// [`FeatureMatrix::gather`] always copies into fresh storage, it never
/// aliases the parent buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    values: Vec<f32>,
    n_features: usize,
}

impl FeatureMatrix {
    /// Wrap a flat buffer as a feature matrix.
    ///
    /// # Errors
    /// `DimensionMismatch` if the buffer length is not a multiple of
    /// `n_features`, `EmptyInput` if `n_features` is zero.
    pub fn new(values: Vec<f32>, n_features: usize) -> CoreResult<Self> {
        if n_features == 0 {
            return Err(CoreError::EmptyInput("n_features must be positive"));
        }
        if values.len() % n_features != 0 {
            return Err(CoreError::DimensionMismatch {
                expected: n_features,
                actual: values.len() % n_features,
            });
        }
        Ok(Self { values, n_features })
    }

    /// An empty matrix with the given row width.
    pub fn empty(n_features: usize) -> Self {
        Self {
            values: Vec::new(),
            n_features: n_features.max(1),
        }
    }

    /// Build from per-spike rows, validating that all rows share one width.
    pub fn from_rows(rows: &[Vec<f32>]) -> CoreResult<Self> {
        let first = rows.first().ok_or(CoreError::EmptyInput("feature rows"))?;
        let n_features = first.len();
        let mut values = Vec::with_capacity(rows.len() * n_features);
        for row in rows {
            if row.len() != n_features {
                return Err(CoreError::DimensionMismatch {
                    expected: n_features,
                    actual: row.len(),
                });
            }
            values.extend_from_slice(row);
        }
        Self::new(values, n_features)
    }

    /// Row width (feature dimensionality).
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of rows (spikes).
    pub fn n_spikes(&self) -> usize {
        self.values.len() / self.n_features
    }

    /// One spike's feature row.
    pub fn row(&self, spike: usize) -> &[f32] {
        let start = spike * self.n_features;
        &self.values[start..start + self.n_features]
    }

    /// Iterate over rows in spike order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.values.chunks_exact(self.n_features)
    }

    /// Copy the selected rows, in the given order, into a new matrix.
    pub fn gather(&self, spikes: &[usize]) -> Self {
        let mut values = Vec::with_capacity(spikes.len() * self.n_features);
        for &spike in spikes {
            values.extend_from_slice(self.row(spike));
        }
        Self {
            values,
            n_features: self.n_features,
        }
    }

    /// Append another matrix's rows.
    ///
    /// # Errors
    /// `DimensionMismatch` if the row widths differ.
    pub fn append(&mut self, other: &FeatureMatrix) -> CoreResult<()> {
        if other.n_features != self.n_features {
            return Err(CoreError::DimensionMismatch {
                expected: self.n_features,
                actual: other.n_features,
            });
        }
        self.values.extend_from_slice(&other.values);
        Ok(())
    }
}
