//! Sequential subtree grower for leaves small enough to finish in memory
//!
//! Exact-greedy recursion over the instances collected for one leaf, using the
//! same splitter, metric and stopper contracts as the distributed steps.

use grove_core::{
    Branch, ErrorMetric, Instance, Monoid, Node, Sampler, Semigroup, Splitter, Stopper, Target,
};
use std::collections::BTreeMap;
use std::marker::PhantomData;

use crate::selection::{select_best, Candidate};

/// Builds the subtree replacing leaf `leaf` of tree `tree`.
///
/// Feature eligibility is asked for the leaf being replaced at every depth of
/// the subtree, since its inner nodes have no stable index until the tree is
/// renumbered.
pub struct LocalGrower<'a, T, S, Sp, M, St> {
    sampler: &'a S,
    splitter: &'a Sp,
    metric: &'a M,
    stopper: &'a St,
    tree: usize,
    leaf: usize,
    max_depth: usize,
    _target: PhantomData<fn() -> T>,
}

impl<'a, T, S, Sp, M, St> LocalGrower<'a, T, S, Sp, M, St>
where
    T: Target,
    S: Sampler,
    Sp: Splitter<T>,
    M: ErrorMetric<T>,
    St: Stopper<T>,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sampler: &'a S,
        splitter: &'a Sp,
        metric: &'a M,
        stopper: &'a St,
        tree: usize,
        leaf: usize,
        max_depth: usize,
    ) -> Self {
        Self {
            sampler,
            splitter,
            metric,
            stopper,
            tree,
            leaf,
            max_depth,
            _target: PhantomData,
        }
    }

    /// Grow a subtree of at most `max_depth` levels. The root target is the
    /// sum of the instance targets.
    pub fn grow(&self, instances: &[Instance<T>]) -> Node<T> {
        let members: Vec<&Instance<T>> = instances.iter().collect();
        let target = T::sum(instances.iter().map(|instance| &instance.target));
        self.build_node(&members, target, 0)
    }

    fn build_node(&self, members: &[&Instance<T>], target: T, depth: usize) -> Node<T> {
        if depth >= self.max_depth || !self.stopper.should_split(&target) {
            return Node::leaf(0, target);
        }
        let Some(best) = self.find_best_split(members, &target) else {
            return Node::leaf(0, target);
        };

        let mut partitions: Vec<Vec<&Instance<T>>> = vec![Vec::new(); best.split.predicates.len()];
        for member in members {
            if let Some(branch) = best.split.branch_for(member.features.get(&best.feature)) {
                partitions[branch].push(*member);
            }
        }

        let feature = best.feature;
        let children = best
            .split
            .predicates
            .into_iter()
            .zip(partitions)
            .map(|((predicate, child_target), child_members)| Branch {
                feature: feature.clone(),
                predicate,
                node: self.build_node(&child_members, child_target, depth + 1),
            })
            .collect();
        Node::Split(children)
    }

    /// Best candidate across features, combined in feature order with the
    /// same rule as the distributed reduce.
    fn find_best_split(
        &self,
        members: &[&Instance<T>],
        target: &T,
    ) -> Option<Candidate<T, M::Value>> {
        let mut eligible: BTreeMap<&str, bool> = BTreeMap::new();
        let mut stats: BTreeMap<&str, Sp::Stat> = BTreeMap::new();
        for member in members {
            for (feature, value) in &member.features {
                let include = *eligible
                    .entry(feature.as_str())
                    .or_insert_with(|| self.sampler.include_feature(feature, self.tree, self.leaf));
                if !include {
                    continue;
                }
                let stat = self.splitter.create(value, &member.target);
                match stats.get_mut(feature.as_str()) {
                    Some(acc) => *acc = acc.plus(&stat),
                    None => {
                        stats.insert(feature.as_str(), stat);
                    }
                }
            }
        }

        stats
            .into_iter()
            .filter_map(|(feature, stat)| {
                let split = self.splitter.split(target, &stat)?;
                let error = self.metric.training_error(&split)?;
                Some(Candidate {
                    feature: feature.to_string(),
                    split,
                    error,
                })
            })
            .reduce(|current, next| select_best(&current, &next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainer::tests::{scenario, EveryTree};
    use grove_core::{BinarySplitter, FrequencyStopper, Moments, SquaredError, Tree};

    fn grow(depth: usize, min_leaf: u64) -> Node<Moments> {
        let sampler = EveryTree(1);
        let splitter = BinarySplitter::new(SquaredError);
        let stopper = FrequencyStopper::new(100, min_leaf);
        LocalGrower::new(&sampler, &splitter, &SquaredError, &stopper, 0, 0, depth)
            .grow(&scenario())
    }

    #[test]
    fn depth_zero_yields_summed_leaf() {
        let Node::Leaf(leaf) = grow(0, 1) else {
            panic!("expected a leaf");
        };
        assert_eq!(leaf.target.count, 4);
        assert_eq!(leaf.target.sum, 224);
    }

    #[test]
    fn grows_to_requested_depth() {
        let tree = Tree::new(grow(2, 1));
        assert_eq!(tree.depth(), 2);
        let sums: Vec<i128> = tree.leaves().iter().map(|leaf| leaf.target.sum).collect();
        assert_eq!(sums, vec![10, 12, 100, 102]);
    }

    #[test]
    fn stopper_limits_growth() {
        // Children of weight 2 are not split with a minimum leaf size of 2.
        let tree = Tree::new(grow(5, 2));
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.leaf_count(), 2);
    }
}
