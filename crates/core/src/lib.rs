//! Grove core: data model and strategies for distributed forest growth
//!
//! Modules:
//! - `instance`: training instances and feature values
//! - `split`: feature predicates and proposed splits
//! - `tree` / `forest`: tree structure, routing and the checkpointed forest
//! - `monoid`: associative combine contracts used by every aggregation
//! - `strategy`: sampler, splitter, error metric and stopper traits
//! - `targets`, `samplers`, `splitters`, `metrics`, `stoppers`: reference strategies
//! - `sketch`: mergeable quantile sketch for temporal holdout thresholds
//! - `deterministic`: seeded hashing and RNG for re-executable randomness
//! - `serialization`: canonical JSON and content digests

pub mod deterministic;
pub mod errors;
pub mod forest;
pub mod instance;
pub mod metrics;
pub mod monoid;
pub mod samplers;
pub mod serialization;
pub mod sketch;
pub mod split;
pub mod splitters;
pub mod stoppers;
pub mod strategy;
pub mod targets;
pub mod tree;

pub use errors::CoreError;
pub use forest::Forest;
pub use instance::{FeatureValue, Features, Instance};
pub use metrics::{ErrorRate, Misclassification, SquaredError, SumSquaredError};
pub use monoid::{Monoid, Semigroup, Weighted};
pub use samplers::{KFoldSampler, OutOfTimeSampler, RandomForestSampler, SingleTreeSampler};
pub use sketch::QuantileSketch;
pub use split::{Predicate, Split};
pub use splitters::{BinarySplitter, ValueTargets};
pub use stoppers::FrequencyStopper;
pub use strategy::{ErrorMetric, Sampler, Splitter, Stopper};
pub use targets::{LabelCounts, Moments, Target};
pub use tree::{Branch, Leaf, Node, Tree};

/// Crate version string for manifests and reports
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
