//! Forest state: the unit of checkpointing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{CoreError, Result};
use crate::monoid::Monoid;
use crate::tree::Tree;

/// Mapping from tree index (`0..num_trees`) to tree.
///
/// A forest is an immutable value: every growth step produces a new forest
/// covering every tree index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forest<T> {
    trees: BTreeMap<usize, Tree<T>>,
}

impl<T> Forest<T> {
    /// Assemble a forest from keyed entries, failing if any index in
    /// `0..num_trees` is missing or an index is out of range.
    pub fn from_entries<I>(num_trees: usize, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, Tree<T>)>,
    {
        let mut trees = BTreeMap::new();
        for (index, tree) in entries {
            if index >= num_trees {
                return Err(CoreError::TreeIndexOutOfRange { index, num_trees });
            }
            trees.insert(index, tree);
        }
        if let Some(missing) = (0..num_trees).find(|index| !trees.contains_key(index)) {
            return Err(CoreError::MissingTree(missing));
        }
        Ok(Self { trees })
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn get(&self, index: usize) -> Option<&Tree<T>> {
        self.trees.get(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Tree<T>)> {
        self.trees.iter().map(|(index, tree)| (*index, tree))
    }

    /// Build a new forest by rewriting each tree.
    pub fn map_trees<F>(&self, mut f: F) -> Result<Forest<T>>
    where
        F: FnMut(usize, &Tree<T>) -> Result<Tree<T>>,
    {
        let trees = self
            .trees
            .iter()
            .map(|(index, tree)| Ok((*index, f(*index, tree)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self { trees })
    }
}

impl<T: Monoid> Forest<T> {
    /// `num_trees` single-leaf trees with a zero target.
    pub fn empty(num_trees: usize) -> Self {
        let trees = (0..num_trees)
            .map(|index| (index, Tree::single_leaf(T::zero())))
            .collect();
        Self { trees }
    }
}
