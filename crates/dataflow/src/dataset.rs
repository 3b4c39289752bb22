//! Partitioned, immutable datasets and their operators.
//!
//! Each operator runs one task per partition on the engine's pool. Shuffles
//! combine map-side first, route keys to reduce partitions by a stable hash,
//! and fold each reduce partition's inputs in map-partition order, so output
//! is reproducible for a given input and partition layout.

use grove_core::deterministic::StableHasher;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::engine::Engine;

pub struct Dataset<T> {
    engine: Engine,
    partitions: Arc<Vec<Vec<T>>>,
}

impl<T> Clone for Dataset<T> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            partitions: Arc::clone(&self.partitions),
        }
    }
}

impl<T> std::fmt::Debug for Dataset<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("partitions", &self.partitions.len())
            .field("len", &self.len())
            .finish()
    }
}

/// Reduce partition for `key` among `partitions`.
fn shuffle_partition<K: Hash>(key: &K, partitions: usize) -> usize {
    let mut hasher = StableHasher::new(0);
    key.hash(&mut hasher);
    (Hasher::finish(&hasher) % partitions as u64) as usize
}

impl<T> Dataset<T> {
    pub(crate) fn from_partitions(engine: Engine, partitions: Vec<Vec<T>>) -> Self {
        Self {
            engine,
            partitions: Arc::new(partitions),
        }
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn len(&self) -> usize {
        self.partitions.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl<T: Send + Sync> Dataset<T> {
    pub fn flat_map<U, I, F>(&self, f: F) -> Dataset<U>
    where
        F: Fn(&T) -> I + Send + Sync,
        I: IntoIterator<Item = U>,
        U: Send + Sync,
    {
        let partitions = self.engine.install(|| {
            self.partitions
                .par_iter()
                .map(|partition| partition.iter().flat_map(&f).collect::<Vec<U>>())
                .collect::<Vec<_>>()
        });
        Dataset::from_partitions(self.engine.clone(), partitions)
    }

    pub fn map<U, F>(&self, f: F) -> Dataset<U>
    where
        F: Fn(&T) -> U + Send + Sync,
        U: Send + Sync,
    {
        self.flat_map(move |item| std::iter::once(f(item)))
    }

    /// Associative reduction of every element; `None` for an empty dataset.
    pub fn reduce<F>(&self, combine: F) -> Option<T>
    where
        T: Clone,
        F: Fn(&T, &T) -> T + Send + Sync,
    {
        let partials: Vec<Option<T>> = self.engine.install(|| {
            self.partitions
                .par_iter()
                .map(|partition| {
                    let mut items = partition.iter();
                    let first = items.next()?.clone();
                    Some(items.fold(first, |acc, item| combine(&acc, item)))
                })
                .collect()
        });
        partials
            .into_iter()
            .flatten()
            .reduce(|acc, item| combine(&acc, &item))
    }

    /// Materialize every element in partition order.
    pub fn collect(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.partitions.iter().flatten().cloned().collect()
    }

    /// Concatenate the partitions of both datasets.
    pub fn union(&self, other: &Dataset<T>) -> Dataset<T>
    where
        T: Clone,
    {
        let partitions = self
            .partitions
            .iter()
            .chain(other.partitions.iter())
            .cloned()
            .collect();
        Dataset::from_partitions(self.engine.clone(), partitions)
    }

    /// Group elements by the first component of `key`, ordering each group by
    /// the second component (a secondary sort).
    pub fn group_sorted_by<K, O, F>(&self, key: F) -> Dataset<(K, Vec<T>)>
    where
        T: Clone,
        K: Ord + Hash + Clone + Send + Sync,
        O: Ord + Clone + Send + Sync,
        F: Fn(&T) -> (K, O) + Send + Sync,
    {
        self.map(|item| {
            let (group, order) = key(item);
            (group, (order, item.clone()))
        })
        .group_by_key()
        .map(|(group, members)| {
            let mut members = members.clone();
            members.sort_by(|a, b| a.0.cmp(&b.0));
            (
                group.clone(),
                members.into_iter().map(|(_, item)| item).collect(),
            )
        })
    }
}

impl<K, V> Dataset<(K, V)>
where
    K: Ord + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn shuffle<A, I, G, M>(&self, init: I, fold: G, merge: M) -> Dataset<(K, A)>
    where
        A: Clone + Send + Sync,
        I: Fn(&V) -> A + Send + Sync,
        G: Fn(&mut A, &V) + Send + Sync,
        M: Fn(&mut A, A) + Send + Sync,
    {
        let reducers = self.engine.partitions();

        // Map side: combine within the partition, then route by key.
        let routed: Vec<Vec<BTreeMap<K, A>>> = self.engine.install(|| {
            self.partitions
                .par_iter()
                .map(|partition| {
                    let mut local: BTreeMap<K, A> = BTreeMap::new();
                    for (key, value) in partition {
                        match local.get_mut(key) {
                            Some(acc) => fold(acc, value),
                            None => {
                                local.insert(key.clone(), init(value));
                            }
                        }
                    }
                    let mut outgoing = vec![BTreeMap::new(); reducers];
                    for (key, acc) in local {
                        outgoing[shuffle_partition(&key, reducers)].insert(key, acc);
                    }
                    outgoing
                })
                .collect()
        });

        // Reduce side: fold each reducer's inputs in map-partition order.
        let partitions: Vec<Vec<(K, A)>> = self.engine.install(|| {
            (0..reducers)
                .into_par_iter()
                .map(|reducer| {
                    let mut merged: BTreeMap<K, A> = BTreeMap::new();
                    for outgoing in &routed {
                        for (key, acc) in &outgoing[reducer] {
                            match merged.get_mut(key) {
                                Some(existing) => merge(existing, acc.clone()),
                                None => {
                                    merged.insert(key.clone(), acc.clone());
                                }
                            }
                        }
                    }
                    merged.into_iter().collect()
                })
                .collect()
        });

        Dataset::from_partitions(self.engine.clone(), partitions)
    }

    /// Combine all values sharing a key with an associative `combine`.
    pub fn sum_by_key<F>(&self, combine: F) -> Dataset<(K, V)>
    where
        F: Fn(&V, &V) -> V + Send + Sync,
    {
        self.shuffle(
            V::clone,
            |acc, value| *acc = combine(acc, value),
            |acc, other| *acc = combine(acc, &other),
        )
    }

    /// Collect all values sharing a key, in map-partition then input order.
    pub fn group_by_key(&self) -> Dataset<(K, Vec<V>)> {
        self.shuffle(
            |value| vec![value.clone()],
            |acc, value| acc.push(value.clone()),
            |acc, other| acc.extend(other),
        )
    }

    /// Materialize into an ordered map; later duplicates overwrite earlier ones.
    pub fn collect_map(&self) -> BTreeMap<K, V> {
        self.partitions
            .iter()
            .flatten()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}
