//! Reference sampler implementations.

use serde::{Deserialize, Serialize};

use crate::deterministic::{unit_interval, LcgRng, StableHasher};
use crate::errors::{CoreError, Result};
use crate::strategy::Sampler;

/// One tree trained on every instance, no validation set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SingleTreeSampler;

impl Sampler for SingleTreeSampler {
    fn num_trees(&self) -> usize {
        1
    }

    fn times_in_training_set(&self, _id: &str, _timestamp: i64, _tree: usize) -> u32 {
        1
    }

    fn include_feature(&self, _feature: &str, _tree: usize, _leaf: usize) -> bool {
        true
    }

    fn include_in_validation_set(&self, _id: &str, _timestamp: i64, _tree: usize) -> bool {
        false
    }
}

/// K-fold cross validation: tree `k` holds out the instances hashed to fold `k`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KFoldSampler {
    num_trees: usize,
    seed: u64,
}

impl KFoldSampler {
    pub fn new(num_trees: usize, seed: u64) -> Result<Self> {
        if num_trees < 2 {
            return Err(CoreError::InvalidParameters(format!(
                "k-fold sampling needs at least 2 folds, got {num_trees}"
            )));
        }
        Ok(Self { num_trees, seed })
    }

    fn fold(&self, id: &str) -> usize {
        let hash = StableHasher::new(self.seed).str("fold").str(id).finish();
        (hash % self.num_trees as u64) as usize
    }
}

impl Sampler for KFoldSampler {
    fn num_trees(&self) -> usize {
        self.num_trees
    }

    fn times_in_training_set(&self, id: &str, _timestamp: i64, tree: usize) -> u32 {
        u32::from(self.fold(id) != tree)
    }

    fn include_feature(&self, _feature: &str, _tree: usize, _leaf: usize) -> bool {
        true
    }

    fn include_in_validation_set(&self, id: &str, _timestamp: i64, tree: usize) -> bool {
        self.fold(id) == tree
    }
}

/// Random forest: Poisson bagging per (instance, tree) and per-leaf feature
/// subsampling. Instances a tree never trained on form its out-of-bag set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RandomForestSampler {
    num_trees: usize,
    feature_rate: f64,
    sampling_rate: f64,
    seed: u64,
}

impl RandomForestSampler {
    pub fn new(num_trees: usize, feature_rate: f64, sampling_rate: f64, seed: u64) -> Result<Self> {
        if num_trees == 0 {
            return Err(CoreError::InvalidParameters(
                "random forest needs at least one tree".to_string(),
            ));
        }
        if !(feature_rate > 0.0 && feature_rate <= 1.0) {
            return Err(CoreError::InvalidParameters(format!(
                "feature_rate must be in (0, 1], got {feature_rate}"
            )));
        }
        if !(sampling_rate > 0.0) {
            return Err(CoreError::InvalidParameters(format!(
                "sampling_rate must be positive, got {sampling_rate}"
            )));
        }
        Ok(Self {
            num_trees,
            feature_rate,
            sampling_rate,
            seed,
        })
    }
}

impl Sampler for RandomForestSampler {
    fn num_trees(&self) -> usize {
        self.num_trees
    }

    fn times_in_training_set(&self, id: &str, _timestamp: i64, tree: usize) -> u32 {
        let seed = StableHasher::new(self.seed)
            .str("bag")
            .str(id)
            .u64(tree as u64)
            .finish();
        LcgRng::new(seed).next_poisson(self.sampling_rate)
    }

    fn include_feature(&self, feature: &str, tree: usize, leaf: usize) -> bool {
        let hash = StableHasher::new(self.seed)
            .str("feature")
            .str(feature)
            .u64(tree as u64)
            .u64(leaf as u64)
            .finish();
        unit_interval(hash) < self.feature_rate
    }

    fn include_in_validation_set(&self, id: &str, timestamp: i64, tree: usize) -> bool {
        self.times_in_training_set(id, timestamp, tree) == 0
    }
}

/// Holds out every instance at or after `threshold`; earlier instances are
/// sampled by the wrapped sampler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutOfTimeSampler<S> {
    base: S,
    threshold: i64,
}

impl<S> OutOfTimeSampler<S> {
    pub fn new(base: S, threshold: i64) -> Self {
        Self { base, threshold }
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }
}

impl<S: Sampler> Sampler for OutOfTimeSampler<S> {
    fn num_trees(&self) -> usize {
        self.base.num_trees()
    }

    fn times_in_training_set(&self, id: &str, timestamp: i64, tree: usize) -> u32 {
        if timestamp < self.threshold {
            self.base.times_in_training_set(id, timestamp, tree)
        } else {
            0
        }
    }

    fn include_feature(&self, feature: &str, tree: usize, leaf: usize) -> bool {
        self.base.include_feature(feature, tree, leaf)
    }

    fn include_in_validation_set(&self, _id: &str, timestamp: i64, _tree: usize) -> bool {
        timestamp >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kfold_trains_on_all_but_one_fold() {
        let sampler = KFoldSampler::new(4, 11).expect("valid sampler");
        for id in ["a", "b", "c", "d", "e"] {
            let training: u32 = (0..4).map(|tree| sampler.times_in_training_set(id, 0, tree)).sum();
            let validating = (0..4)
                .filter(|tree| sampler.include_in_validation_set(id, 0, *tree))
                .count();
            assert_eq!(training, 3);
            assert_eq!(validating, 1);
        }
    }

    #[test]
    fn kfold_rejects_single_fold() {
        assert!(KFoldSampler::new(1, 0).is_err());
    }

    #[test]
    fn random_forest_out_of_bag_matches_zero_bagging() {
        let sampler = RandomForestSampler::new(8, 0.5, 1.0, 3).expect("valid sampler");
        for tree in 0..8 {
            for id in ["x", "y", "z"] {
                let times = sampler.times_in_training_set(id, 0, tree);
                assert_eq!(sampler.include_in_validation_set(id, 0, tree), times == 0);
                assert_eq!(times, sampler.times_in_training_set(id, 0, tree));
            }
        }
    }

    #[test]
    fn random_forest_rejects_bad_rates() {
        assert!(RandomForestSampler::new(2, 0.0, 1.0, 0).is_err());
        assert!(RandomForestSampler::new(2, 1.5, 1.0, 0).is_err());
        assert!(RandomForestSampler::new(2, 0.5, 0.0, 0).is_err());
        assert!(RandomForestSampler::new(0, 0.5, 1.0, 0).is_err());
    }

    #[test]
    fn out_of_time_holds_out_late_instances() {
        let sampler = OutOfTimeSampler::new(SingleTreeSampler, 3);
        assert_eq!(sampler.times_in_training_set("a", 2, 0), 1);
        assert_eq!(sampler.times_in_training_set("a", 3, 0), 0);
        assert!(!sampler.include_in_validation_set("a", 2, 0));
        assert!(sampler.include_in_validation_set("a", 3, 0));
        assert_eq!(sampler.num_trees(), 1);
    }
}
