//! Grove trainer - distributed decision-forest growth
//!
//! Grows an ensemble of decision trees over a partitioned training set by
//! repeating checkpointed map/shuffle/reduce steps:
//!
//! - `update_targets` refreshes leaf statistics from the data
//! - `expand` grows every eligible leaf by one level from global statistics
//! - `expand_in_memory` finishes small leaves with a sequential grower
//! - `validate` and `feature_importance` score a forest on held-out cases
//! - `out_of_time` swaps in a temporal holdout sampler
//!
//! Every step is a pure function of its input forest and the data, so a
//! failed step can simply be rerun.

pub mod config;
pub mod dataset;
pub mod errors;
pub mod grow;
pub mod holdout;
pub mod pipeline;
pub mod selection;
pub mod trainer;
pub mod validate;

pub use config::{ConfiguredSampler, SamplerConfig, TrainerConfig};
pub use dataset::{feature_names, feature_stats, load_csv, parse_csv, FeatureStats};
pub use errors::{Result, TrainerError};
pub use grow::LocalGrower;
pub use pipeline::{expand_from, expand_times, Stage, TrainingPlan};
pub use selection::{select_best, Candidate};
pub use trainer::{GrowthOptions, Trainer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
