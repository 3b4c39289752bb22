//! Error types for the dataflow engine and checkpoint store

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataflowError {
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    /// The path has no commit marker: the step never finished or was aborted
    #[error("Checkpoint {} is not committed", .0.display())]
    NotCommitted(PathBuf),

    /// Each checkpoint path is written by exactly one step
    #[error("Checkpoint {} is already committed", .0.display())]
    AlreadyCommitted(PathBuf),

    #[error("Checkpoint {} digest mismatch: expected {expected}, found {actual}", .path.display())]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Checkpoint {} is corrupt: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, DataflowError>;
