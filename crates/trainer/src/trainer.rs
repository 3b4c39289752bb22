//! Distributed growth steps over a partitioned training set
//!
//! Each step reads a forest value, runs one map/shuffle/reduce pass over the
//! training data and commits the resulting forest under a checkpoint name.
//! Steps never mutate their input forest.

use grove_core::{
    ErrorMetric, Forest, Instance, Leaf, Monoid, Node, Sampler, Semigroup, Splitter, Stopper,
    Target, Tree, Weighted,
};
use grove_dataflow::{CheckpointStore, Dataset};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::errors::{Result, TrainerError};
use crate::selection::{select_best, Candidate};

/// Knobs shared by the growth, holdout and importance passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthOptions {
    /// Seed for hashed sampling coins and importance buckets
    pub seed: u64,
    /// Bucket budget of the timestamp sketch used by `out_of_time`
    pub sketch_capacity: usize,
    /// Cap on instances collected for one locally grown leaf
    pub max_local_instances: Option<usize>,
    pub importance_buckets: usize,
}

impl Default for GrowthOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            sketch_capacity: grove_core::QuantileSketch::DEFAULT_CAPACITY,
            max_local_instances: None,
            importance_buckets: 16,
        }
    }
}

/// Growth engine over one training set and one checkpoint root.
///
/// Strategies are fixed at construction; replacing the sampler (see
/// `out_of_time`) produces a new trainer.
pub struct Trainer<T, S, Sp, M, St> {
    pub(crate) data: Dataset<Instance<T>>,
    pub(crate) store: CheckpointStore,
    pub(crate) sampler: S,
    pub(crate) splitter: Sp,
    pub(crate) metric: M,
    pub(crate) stopper: St,
    pub(crate) options: GrowthOptions,
}

impl<T, S, Sp, M, St> Trainer<T, S, Sp, M, St>
where
    T: Target,
    S: Sampler,
    Sp: Splitter<T>,
    M: ErrorMetric<T>,
    St: Stopper<T>,
{
    pub fn new(
        data: Dataset<Instance<T>>,
        store: CheckpointStore,
        sampler: S,
        splitter: Sp,
        metric: M,
        stopper: St,
    ) -> Self {
        Self {
            data,
            store,
            sampler,
            splitter,
            metric,
            stopper,
            options: GrowthOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GrowthOptions) -> Self {
        self.options = options;
        self
    }

    pub fn data(&self) -> &Dataset<Instance<T>> {
        &self.data
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    pub fn options(&self) -> &GrowthOptions {
        &self.options
    }

    pub fn num_trees(&self) -> usize {
        self.sampler.num_trees()
    }

    /// Commit the empty starting forest under `name`.
    pub fn initialize(&self, name: &str) -> Result<Forest<T>> {
        let forest = Forest::empty(self.num_trees());
        self.write_forest(name, &forest)?;
        info!(trees = forest.num_trees(), checkpoint = name, "initialized forest");
        Ok(forest)
    }

    pub fn write_forest(&self, name: &str, forest: &Forest<T>) -> Result<()> {
        let records: Vec<(usize, &Tree<T>)> = forest.iter().collect();
        self.store.write(name, &records)?;
        Ok(())
    }

    /// Read a committed forest, requiring every tree index to be present.
    pub fn read_forest(&self, name: &str) -> Result<Forest<T>> {
        let records: Vec<(usize, Tree<T>)> = self.store.read(name)?;
        Ok(Forest::from_entries(self.num_trees(), records)?)
    }

    /// Trees an instance trains, the leaf it reaches in each and its bagging
    /// count there. Trees with a zero count are skipped.
    pub(crate) fn routed<'a>(
        &'a self,
        forest: &'a Forest<T>,
        instance: &'a Instance<T>,
    ) -> impl Iterator<Item = (usize, &'a Leaf<T>, u32)> + 'a {
        forest.iter().filter_map(move |(tree_index, tree)| {
            let times =
                self.sampler
                    .times_in_training_set(&instance.id, instance.timestamp, tree_index);
            if times == 0 {
                return None;
            }
            tree.leaf_for(&instance.features)
                .map(|leaf| (tree_index, leaf, times))
        })
    }

    /// Refresh every leaf target from the instances that reach it.
    ///
    /// Leaves no instance reaches keep their previous target.
    pub fn update_targets(&self, forest: &Forest<T>, name: &str) -> Result<Forest<T>> {
        let sums = self
            .data
            .flat_map(|instance| {
                self.routed(forest, instance)
                    .map(|(tree_index, leaf, times)| {
                        ((tree_index, leaf.index), instance.target.times(times))
                    })
                    .collect::<Vec<_>>()
            })
            .sum_by_key(|a, b| a.plus(b))
            .collect_map();
        debug!(leaves = sums.len(), "aggregated leaf targets");

        let next = forest.map_trees(|tree_index, tree| {
            Ok(tree.update_targets(|leaf| sums.get(&(tree_index, leaf.index)).cloned()))
        })?;
        self.write_forest(name, &next)?;
        info!(checkpoint = name, "updated leaf targets");
        Ok(next)
    }

    /// Grow every eligible leaf by one level using statistics gathered over
    /// the whole training set.
    pub fn expand(&self, forest: &Forest<T>, name: &str) -> Result<Forest<T>> {
        let stats = self
            .data
            .flat_map(|instance| {
                let mut out = Vec::new();
                for (tree_index, leaf, times) in self.routed(forest, instance) {
                    if !self.splits_distributed(&leaf.target) {
                        continue;
                    }
                    for (feature, value) in &instance.features {
                        if !self.sampler.include_feature(feature, tree_index, leaf.index) {
                            continue;
                        }
                        let stat = self.splitter.create(value, &instance.target);
                        for _ in 0..times {
                            out.push(((tree_index, leaf.index, feature.clone()), stat.clone()));
                        }
                    }
                }
                out
            })
            .sum_by_key(|a, b| a.plus(b));

        let winners = stats
            .flat_map(|((tree_index, leaf_index, feature), stat)| {
                let leaf = forest.get(*tree_index)?.leaf_at(*leaf_index)?;
                let split = self.splitter.split(&leaf.target, stat)?;
                let error = self.metric.training_error(&split)?;
                Some((
                    (*tree_index, *leaf_index),
                    Candidate {
                        feature: feature.clone(),
                        split,
                        error,
                    },
                ))
            })
            .sum_by_key(select_best)
            .map(|((tree_index, leaf_index), candidate)| {
                (*tree_index, BTreeMap::from([(*leaf_index, candidate.clone())]))
            })
            .union(&self.empty_entries())
            .sum_by_key(merge_entries)
            .collect_map();

        let grown: usize = winners.values().map(BTreeMap::len).sum();
        let next = self.rebuild(forest, &winners, |candidate| {
            Node::from_split(&candidate.feature, candidate.split.clone())
        })?;
        self.write_forest(name, &next)?;
        info!(checkpoint = name, leaves_split = grown, "expanded forest by one level");
        Ok(next)
    }

    /// Whether `expand` grows a leaf with this target.
    ///
    /// Leaves heavier than `max_local_instances` are never grown locally, so
    /// they stay eligible here even when the stopper would finish them in
    /// memory.
    pub(crate) fn splits_distributed(&self, target: &T) -> bool {
        self.stopper.should_split(target)
            && (self.stopper.should_split_distributed(target) || self.exceeds_local_cap(target))
    }

    pub(crate) fn exceeds_local_cap(&self, target: &T) -> bool {
        self.options
            .max_local_instances
            .map_or(false, |cap| target.weight() > cap as u64)
    }

    /// One empty per-leaf map for every tree index, so the per-tree reduce
    /// covers trees that produced nothing.
    pub(crate) fn empty_entries<V: Send + Sync>(&self) -> Dataset<(usize, BTreeMap<usize, V>)> {
        self.data.engine().parallelize(
            (0..self.num_trees())
                .map(|tree_index| (tree_index, BTreeMap::new()))
                .collect(),
        )
    }

    /// Replace leaves with subtrees built from the per-tree, per-leaf
    /// replacements. A tree index absent from `per_tree` fails the step.
    pub(crate) fn rebuild<V, F>(
        &self,
        forest: &Forest<T>,
        per_tree: &BTreeMap<usize, BTreeMap<usize, V>>,
        replace: F,
    ) -> Result<Forest<T>>
    where
        F: Fn(&V) -> Node<T>,
    {
        let num_trees = self.num_trees();
        let mut entries = Vec::with_capacity(num_trees);
        for tree_index in 0..num_trees {
            let tree = forest
                .get(tree_index)
                .ok_or(TrainerError::IncompleteForest(tree_index))?;
            let replacements = per_tree
                .get(&tree_index)
                .ok_or(TrainerError::IncompleteForest(tree_index))?;
            let grown = tree.grow(|leaf| replacements.get(&leaf.index).map(&replace));
            entries.push((tree_index, grown));
        }
        Ok(Forest::from_entries(num_trees, entries)?)
    }
}

/// Union of per-leaf maps; leaves are unique per tree, so keys never clash.
pub(crate) fn merge_entries<V: Clone>(
    a: &BTreeMap<usize, V>,
    b: &BTreeMap<usize, V>,
) -> BTreeMap<usize, V> {
    let mut merged = a.clone();
    merged.extend(b.iter().map(|(leaf, value)| (*leaf, value.clone())));
    merged
}
