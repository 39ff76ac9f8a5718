//! Error types for rank filtering.
//!
//! Every variant describes a configuration problem detected before a scan
//! starts. Contract violations inside the scan loop are assertions instead.

use thiserror::Error;

/// Errors that can occur while configuring or running a filter
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RankError {
    /// Rank outside `[0, 1]` (or NaN)
    #[error("rank must lie in [0, 1], got {0}")]
    InvalidRank(f32),

    /// Structuring element without a single active cell
    #[error("structuring element has no active cells")]
    EmptyKernel,

    /// Kernel, radius, region or array disagree on the number of axes
    #[error("dimension mismatch: expected {expected} axes, got {actual}")]
    DimensionMismatch {
        /// Axes the filter was configured for
        expected: usize,
        /// Axes actually supplied
        actual: usize,
    },

    /// Input, mask and output views disagree on their shape
    #[error("shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Which view was rejected
        what: &'static str,
        /// Shape the filter needed
        expected: Vec<usize>,
        /// Shape it was given
        actual: Vec<usize>,
    },

    /// Requested region reaches past the array extent
    #[error("region {region} exceeds array shape {shape:?}")]
    RegionOutOfBounds {
        /// Display form of the region
        region: String,
        /// Shape of the array it was checked against
        shape: Vec<usize>,
    },

    /// Any other invalid argument
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Result type for filter operations
pub type RankResult<T> = Result<T, RankError>;

/// Reject ranks outside `[0, 1]`.
pub(crate) fn check_rank(rank: f32) -> RankResult<f32> {
    if (0.0..=1.0).contains(&rank) {
        Ok(rank)
    } else {
        Err(RankError::InvalidRank(rank))
    }
}

/// Reject views whose shape differs from `expected`.
pub(crate) fn check_shape(
    what: &'static str,
    expected: &[usize],
    actual: &[usize],
) -> RankResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(RankError::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        })
    }
}
