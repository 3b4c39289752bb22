//! Pluggable strategy contracts consumed by the growth engine.
//!
//! The engine calls these from parallel workers and may call them again when
//! a partition is re-executed, so implementations must be pure functions of
//! their arguments (randomness comes from seeded hashes, never shared state).

use std::fmt::Debug;

use crate::instance::FeatureValue;
use crate::monoid::Semigroup;
use crate::split::Split;

/// Decides bagging, feature eligibility and validation membership.
pub trait Sampler: Send + Sync {
    fn num_trees(&self) -> usize;

    /// How many times an instance counts toward training `tree` (may be zero).
    fn times_in_training_set(&self, id: &str, timestamp: i64, tree: usize) -> u32;

    /// Whether `feature` may be considered for splitting `leaf` of `tree`.
    fn include_feature(&self, feature: &str, tree: usize, leaf: usize) -> bool;

    /// Whether `tree` should be evaluated on this instance during validation.
    fn include_in_validation_set(&self, id: &str, timestamp: i64, tree: usize) -> bool;
}

/// Produces per-value statistics and turns them into candidate splits.
pub trait Splitter<T>: Send + Sync {
    type Stat: Semigroup + Clone + Send + Sync + Debug;

    fn create(&self, value: &FeatureValue, target: &T) -> Self::Stat;

    /// Propose a split of a leaf with target `parent` from combined statistics.
    fn split(&self, parent: &T, stat: &Self::Stat) -> Option<Split<T>>;
}

/// Scores predictions against actual targets.
pub trait ErrorMetric<T>: Send + Sync {
    type Value: Semigroup + PartialOrd + Clone + Send + Sync + Debug;

    fn create(&self, actual: &T, predictions: &[T]) -> Self::Value;

    /// Training error of a split: each branch predicts its own target.
    fn training_error(&self, split: &Split<T>) -> Option<Self::Value> {
        split
            .predicates
            .iter()
            .map(|(_, target)| self.create(target, std::slice::from_ref(target)))
            .reduce(|acc, error| acc.plus(&error))
    }
}

/// Decides whether, and how eagerly, a leaf should keep splitting.
pub trait Stopper<T>: Send + Sync {
    fn should_split(&self, target: &T) -> bool;

    /// Whether the leaf is large enough to justify another distributed round
    /// rather than being finished locally.
    fn should_split_distributed(&self, target: &T) -> bool;

    /// Fraction of a leaf's instances to collect when finishing it locally.
    fn sampling_rate_to_split_locally(&self, target: &T) -> f64;
}
