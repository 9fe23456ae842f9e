//! Core data-model error types.

use thiserror::Error;

/// Errors raised by the core data-model types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A vector or row had a different dimensionality than the container.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensionality
        expected: usize,
        /// Actual dimensionality
        actual: usize,
    },

    /// Two parallel arrays that must be indexed in lockstep disagree in length.
    #[error("length mismatch in {what}: {left} vs {right}")]
    LengthMismatch {
        /// Which parallel arrays disagree
        what: &'static str,
        /// Length of the first array
        left: usize,
        /// Length of the second array
        right: usize,
    },

    /// An operation received no data to work on.
    #[error("empty input: {0}")]
    EmptyInput(&'static str),
}

/// Result type for core data-model operations.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a `LengthMismatch` error.
    pub fn length_mismatch(what: &'static str, left: usize, right: usize) -> Self {
        CoreError::LengthMismatch { what, left, right }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_display() {
        let err = CoreError::DimensionMismatch {
            expected: 5,
            actual: 3,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("expected 5"));
        assert!(msg.contains("got 3"));
    }

    #[test]
    fn test_length_mismatch_helper() {
        let err = CoreError::length_mismatch("means vs dof", 4, 2);
        let msg = format!("{}", err);
        assert!(msg.contains("means vs dof"));
        assert!(msg.contains("4 vs 2"));
    }
}
