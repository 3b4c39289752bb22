use std::path::PathBuf;
use thiserror::Error;

use grove_core::CoreError;
use grove_dataflow::DataflowError;

/// Errors returned by the growth engine, pipeline and loaders.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// A growth step produced no entry for a tree index it must cover
    #[error("tree {0} is missing from the step output")]
    IncompleteForest(usize),

    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Dataflow(#[from] DataflowError),
}

pub type Result<T> = std::result::Result<T, TrainerError>;
