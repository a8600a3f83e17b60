//! Error types for UIS-RNN training utilities.

use thiserror::Error;

/// Result type alias for UIS-RNN utility operations.
pub type Result<T> = std::result::Result<T, UisRnnError>;

/// Errors that can occur while preparing or scoring training batches.
#[derive(Debug, Error)]
pub enum UisRnnError {
    /// Invalid configuration parameter.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Shape mismatch in tensor operations.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        actual: Vec<usize>,
    },

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        actual: usize,
    },

    /// Empty input where non-empty was required.
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// Every row of the batch is padding, so the loss has no denominator.
    #[error("no non-padding rows in batch")]
    NoValidRows,

    /// Mini-batch request that cannot be sampled without replacement.
    #[error("cannot sample {requested} sub-sequences out of {available}")]
    InvalidBatchSize {
        /// Requested mini-batch size.
        requested: usize,
        /// Number of sub-sequences available.
        available: usize,
    },

    /// Candle tensor operation error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UisRnnError {
    /// Create a shape mismatch error.
    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an empty input error.
    pub fn empty_input(msg: impl Into<String>) -> Self {
        Self::EmptyInput(msg.into())
    }
}
