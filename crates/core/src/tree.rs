//! Decision tree structure with leaf routing and leaf-wise rewrites.
//!
//! A tree is either a single leaf or a split node whose branches each carry a
//! feature key, a predicate over that feature's value and a child node.
//! Leaf indices are assigned depth-first and are unique within a tree; every
//! structural rewrite renumbers them.

use serde::{Deserialize, Serialize};

use crate::instance::Features;
use crate::split::{Predicate, Split};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaf<T> {
    pub index: usize,
    pub target: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch<T> {
    pub feature: String,
    pub predicate: Predicate,
    pub node: Node<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node<T> {
    Leaf(Leaf<T>),
    Split(Vec<Branch<T>>),
}

impl<T> Node<T> {
    pub fn leaf(index: usize, target: T) -> Self {
        Node::Leaf(Leaf { index, target })
    }

    /// Split node on `feature` with one fresh leaf per predicate of `split`.
    ///
    /// Child leaf indices are placeholders until the owning tree is renumbered.
    pub fn from_split(feature: &str, split: Split<T>) -> Self {
        let children = split
            .predicates
            .into_iter()
            .map(|(predicate, target)| Branch {
                feature: feature.to_string(),
                predicate,
                node: Node::leaf(0, target),
            })
            .collect();
        Node::Split(children)
    }

    fn depth(&self) -> usize {
        match self {
            Node::Leaf(_) => 0,
            Node::Split(children) => {
                1 + children
                    .iter()
                    .map(|branch| branch.node.depth())
                    .max()
                    .unwrap_or(0)
            }
        }
    }

    fn renumber(&mut self, next: &mut usize) {
        match self {
            Node::Leaf(leaf) => {
                leaf.index = *next;
                *next += 1;
            }
            Node::Split(children) => {
                for branch in children {
                    branch.node.renumber(next);
                }
            }
        }
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Leaf<T>>) {
        match self {
            Node::Leaf(leaf) => out.push(leaf),
            Node::Split(children) => {
                for branch in children {
                    branch.node.collect_leaves(out);
                }
            }
        }
    }
}

impl<T: Clone> Node<T> {
    fn map_leaves<F>(&self, f: &mut F) -> Node<T>
    where
        F: FnMut(&Leaf<T>) -> Node<T>,
    {
        match self {
            Node::Leaf(leaf) => f(leaf),
            Node::Split(children) => Node::Split(
                children
                    .iter()
                    .map(|branch| Branch {
                        feature: branch.feature.clone(),
                        predicate: branch.predicate.clone(),
                        node: branch.node.map_leaves(f),
                    })
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree<T> {
    pub root: Node<T>,
}

impl<T> Tree<T> {
    /// Build a tree from `root`, assigning depth-first leaf indices.
    pub fn new(mut root: Node<T>) -> Self {
        let mut next = 0;
        root.renumber(&mut next);
        Self { root }
    }

    /// A tree consisting of a single leaf with index 0.
    pub fn single_leaf(target: T) -> Self {
        Self {
            root: Node::leaf(0, target),
        }
    }

    /// Route a feature vector from the root to its leaf.
    ///
    /// Branches are tried in order and the first matching predicate wins.
    /// Returns `None` only for a malformed split whose predicates do not
    /// cover the value.
    pub fn leaf_for(&self, features: &Features) -> Option<&Leaf<T>> {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf(leaf) => return Some(leaf),
                Node::Split(children) => {
                    let branch = children
                        .iter()
                        .find(|branch| branch.predicate.matches(features.get(&branch.feature)))?;
                    node = &branch.node;
                }
            }
        }
    }

    pub fn target_for(&self, features: &Features) -> Option<&T> {
        self.leaf_for(features).map(|leaf| &leaf.target)
    }

    /// All leaves in depth-first order, which is also index order.
    pub fn leaves(&self) -> Vec<&Leaf<T>> {
        let mut out = Vec::new();
        self.root.collect_leaves(&mut out);
        out
    }

    pub fn leaf_at(&self, index: usize) -> Option<&Leaf<T>> {
        self.leaves().into_iter().find(|leaf| leaf.index == index)
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves().len()
    }

    /// Number of split levels on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        self.root.depth()
    }
}

impl<T: Clone> Tree<T> {
    /// Replace leaf targets. Leaves for which `f` returns `None` keep theirs.
    pub fn update_targets<F>(&self, mut f: F) -> Tree<T>
    where
        F: FnMut(&Leaf<T>) -> Option<T>,
    {
        let root = self.root.map_leaves(&mut |leaf: &Leaf<T>| match f(leaf) {
            Some(target) => Node::leaf(leaf.index, target),
            None => Node::Leaf(leaf.clone()),
        });
        Tree { root }
    }

    /// Replace leaves with new subtrees. Leaves for which `f` returns `None`
    /// are kept. Leaf indices are renumbered afterwards.
    pub fn grow<F>(&self, mut f: F) -> Tree<T>
    where
        F: FnMut(&Leaf<T>) -> Option<Node<T>>,
    {
        let root = self
            .root
            .map_leaves(&mut |leaf: &Leaf<T>| f(leaf).unwrap_or_else(|| Node::Leaf(leaf.clone())));
        Tree::new(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::FeatureValue;

    fn features(pairs: &[(&str, i64)]) -> Features {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), FeatureValue::Numeric(*value)))
            .collect()
    }

    fn two_level_tree() -> Tree<u64> {
        let split = Split::binary(Predicate::LessThan(FeatureValue::Numeric(10)), 1u64, 2u64);
        let tree = Tree::single_leaf(3u64);
        let tree = tree.grow(|_| Some(Node::from_split("x", split.clone())));
        let inner = Split::binary(Predicate::EqualTo(FeatureValue::from("red")), 4u64, 5u64);
        tree.grow(|leaf| (leaf.index == 1).then(|| Node::from_split("color", inner.clone())))
    }

    #[test]
    fn single_leaf_routes_everything_to_index_zero() {
        let tree = Tree::single_leaf(7u64);
        let leaf = tree.leaf_for(&Features::new()).expect("root leaf");
        assert_eq!(leaf.index, 0);
        assert_eq!(leaf.target, 7);
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn grow_renumbers_leaves_depth_first() {
        let tree = two_level_tree();
        let indices: Vec<usize> = tree.leaves().iter().map(|leaf| leaf.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(tree.depth(), 2);

        let targets: Vec<u64> = tree.leaves().iter().map(|leaf| leaf.target).collect();
        assert_eq!(targets, vec![1, 4, 5]);
    }

    #[test]
    fn routing_is_deterministic() {
        let tree = two_level_tree();
        let mut row = features(&[("x", 12)]);
        row.insert("color".to_string(), FeatureValue::from("red"));

        let first = tree.leaf_for(&row).map(|leaf| leaf.index);
        let second = tree.leaf_for(&row).map(|leaf| leaf.index);
        assert_eq!(first, Some(1));
        assert_eq!(first, second);

        assert_eq!(tree.leaf_for(&features(&[("x", 3)])).map(|l| l.index), Some(0));
        // Missing colour follows the negated branch.
        assert_eq!(tree.leaf_for(&features(&[("x", 30)])).map(|l| l.index), Some(2));
    }

    #[test]
    fn update_targets_keeps_untouched_leaves() {
        let tree = two_level_tree();
        let updated = tree.update_targets(|leaf| (leaf.index == 2).then_some(50));
        let targets: Vec<u64> = updated.leaves().iter().map(|leaf| leaf.target).collect();
        assert_eq!(targets, vec![1, 4, 50]);
        assert_eq!(updated.leaf_at(2).map(|l| l.target), Some(50));
    }
}
