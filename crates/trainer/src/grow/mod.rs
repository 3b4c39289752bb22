//! Local finishing of small leaves
//!
//! Leaves that no longer need distributed rounds are subsampled, gathered on
//! one worker each and grown to a fixed depth in memory.

pub mod local;

use grove_core::deterministic::{unit_interval, StableHasher};
use grove_core::{ErrorMetric, Forest, Instance, Node, Sampler, Splitter, Stopper, Target};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use crate::errors::Result;
use crate::trainer::{merge_entries, Trainer};

pub use local::LocalGrower;

impl<T, S, Sp, M, St> Trainer<T, S, Sp, M, St>
where
    T: Target,
    S: Sampler,
    Sp: Splitter<T>,
    M: ErrorMetric<T>,
    St: Stopper<T>,
{
    /// Replace every splittable leaf with a subtree of depth `depth` grown
    /// from a sample of the instances reaching it.
    ///
    /// Each bagged copy of an instance is kept when a coin hashed from the
    /// seed, instance id, tree and copy number falls below the stopper's local
    /// sampling rate for the leaf. With `max_local_instances` set, sampled
    /// copies are counted per leaf first and oversized leaves are never
    /// gathered; `expand` picks them up instead.
    pub fn expand_in_memory(&self, forest: &Forest<T>, name: &str, depth: usize) -> Result<Forest<T>> {
        let oversized: BTreeSet<(usize, usize)> = match self.options.max_local_instances {
            Some(cap) => self
                .data
                .flat_map(|instance| {
                    self.sampled_copies(forest, instance)
                        .into_iter()
                        .map(|key| (key, 1u64))
                        .collect::<Vec<_>>()
                })
                .sum_by_key(|a, b| a + b)
                .collect_map()
                .into_iter()
                .filter(|(_, collected)| *collected > cap as u64)
                .map(|((tree_index, leaf_index), collected)| {
                    warn!(
                        tree = tree_index,
                        leaf = leaf_index,
                        instances = collected,
                        cap,
                        "leaf exceeds the local instance cap, leaving it to distributed expand"
                    );
                    (tree_index, leaf_index)
                })
                .collect(),
            None => BTreeSet::new(),
        };

        let groups = self
            .data
            .flat_map(|instance| {
                self.sampled_copies(forest, instance)
                    .into_iter()
                    .filter(|key| !oversized.contains(key))
                    .map(|key| (key, instance.clone()))
                    .collect::<Vec<_>>()
            })
            .group_by_key();

        let subtrees = groups
            .map(|((tree_index, leaf_index), members)| {
                let grower = LocalGrower::new(
                    &self.sampler,
                    &self.splitter,
                    &self.metric,
                    &self.stopper,
                    *tree_index,
                    *leaf_index,
                    depth,
                );
                let subtree = grower.grow(members);
                (*tree_index, BTreeMap::from([(*leaf_index, subtree)]))
            })
            .union(&self.empty_entries())
            .sum_by_key(merge_entries)
            .collect_map();

        let replaced: usize = subtrees.values().map(BTreeMap::len).sum();
        let next = self.rebuild(forest, &subtrees, |node: &Node<T>| node.clone())?;
        self.write_forest(name, &next)?;
        info!(checkpoint = name, depth, leaves_grown = replaced, "finished leaves in memory");
        Ok(next)
    }

    /// `(tree, leaf)` of every bagged copy of `instance` sampled for local
    /// growth, one entry per kept copy.
    fn sampled_copies(&self, forest: &Forest<T>, instance: &Instance<T>) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for (tree_index, leaf, times) in self.routed(forest, instance) {
            if !self.stopper.should_split(&leaf.target) {
                continue;
            }
            let rate = self.stopper.sampling_rate_to_split_locally(&leaf.target);
            for copy in 0..times {
                let coin = StableHasher::new(self.options.seed)
                    .str("local")
                    .str(&instance.id)
                    .u64(tree_index as u64)
                    .u64(u64::from(copy))
                    .finish();
                if unit_interval(coin) < rate {
                    out.push((tree_index, leaf.index));
                }
            }
        }
        out
    }
}
