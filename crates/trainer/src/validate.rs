//! Held-out validation error and swap-based feature importance.

use grove_core::deterministic::StableHasher;
use grove_core::{ErrorMetric, Forest, Sampler, Semigroup, Splitter, Stopper, Target};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::trainer::Trainer;

impl<T, S, Sp, M, St> Trainer<T, S, Sp, M, St>
where
    T: Target,
    S: Sampler,
    Sp: Splitter<T>,
    M: ErrorMetric<T>,
    St: Stopper<T>,
{
    /// Combined error of every instance against the trees it validates.
    ///
    /// Instances with no validating tree contribute nothing; `None` when no
    /// instance has one.
    pub fn validate(&self, forest: &Forest<T>) -> Option<M::Value> {
        let error = self
            .data
            .flat_map(|instance| {
                let predictions: Vec<T> = forest
                    .iter()
                    .filter(|(tree_index, _)| {
                        self.sampler.include_in_validation_set(
                            &instance.id,
                            instance.timestamp,
                            *tree_index,
                        )
                    })
                    .filter_map(|(_, tree)| tree.target_for(&instance.features).cloned())
                    .collect();
                (!predictions.is_empty())
                    .then(|| self.metric.create(&instance.target, &predictions))
            })
            .reduce(|a, b| a.plus(b));
        if error.is_none() {
            warn!("no instance belongs to any validation set");
        }
        error
    }

    /// Error attributed to each feature when its value is swapped in from a
    /// neighbouring instance.
    ///
    /// Instances are hashed into buckets and ordered by an independent hash.
    /// For each adjacent pair `(prev, cur)` and each tree `cur` validates,
    /// one feature of `prev` (chosen by hash) replaces `cur`'s value and the
    /// doctored vector is scored against `cur`'s target. This is one swap per
    /// pair, not a full permutation test.
    pub fn feature_importance(&self, forest: &Forest<T>) -> BTreeMap<String, M::Value> {
        let seed = self.options.seed;
        let buckets = self.options.importance_buckets.max(1) as u64;
        let contributions = self
            .data
            .group_sorted_by(|instance| {
                let bucket = StableHasher::new(seed)
                    .str("bucket")
                    .str(&instance.id)
                    .finish()
                    % buckets;
                let order = StableHasher::new(seed)
                    .str("order")
                    .str(&instance.id)
                    .finish();
                (bucket, (order, instance.id.clone()))
            })
            .flat_map(|(_, members)| {
                let mut out = Vec::new();
                for pair in members.windows(2) {
                    let (prev, cur) = (&pair[0], &pair[1]);
                    if prev.features.is_empty() {
                        continue;
                    }
                    for (tree_index, tree) in forest.iter() {
                        if !self.sampler.include_in_validation_set(
                            &cur.id,
                            cur.timestamp,
                            tree_index,
                        ) {
                            continue;
                        }
                        let pick = StableHasher::new(seed)
                            .str("swap")
                            .str(&prev.id)
                            .str(&cur.id)
                            .u64(tree_index as u64)
                            .finish()
                            % prev.features.len() as u64;
                        let Some((feature, value)) = prev.features.iter().nth(pick as usize) else {
                            continue;
                        };
                        let mut doctored = cur.features.clone();
                        doctored.insert(feature.clone(), value.clone());
                        if let Some(prediction) = tree.target_for(&doctored) {
                            let error = self
                                .metric
                                .create(&cur.target, std::slice::from_ref(prediction));
                            out.push((feature.clone(), error));
                        }
                    }
                }
                out
            });

        let importance = contributions.sum_by_key(|a, b| a.plus(b)).collect_map();
        debug!(features = importance.len(), "estimated feature importance");
        importance
    }
}
