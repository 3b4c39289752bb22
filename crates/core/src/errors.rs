//! Error types for the Grove core crate

use thiserror::Error;

/// Errors raised by forest assembly and strategy configuration
#[derive(Error, Debug)]
pub enum CoreError {
    /// A forest is missing one of its tree indices
    #[error("Forest is missing tree {0}")]
    MissingTree(usize),

    /// A tree index falls outside `0..num_trees`
    #[error("Tree index {index} out of range for a forest of {num_trees} trees")]
    TreeIndexOutOfRange { index: usize, num_trees: usize },

    /// Strategy parameters are unusable
    #[error("Invalid strategy parameters: {0}")]
    InvalidParameters(String),

    /// A regression target is too large to accumulate exactly
    #[error("Target {value} exceeds the magnitude bound {bound}")]
    TargetOutOfRange { value: i64, bound: i64 },
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
