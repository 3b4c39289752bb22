//! Algebraic combine contracts used by every distributed aggregation.
//!
//! Reducers in the dataflow engine may see partial sums in any grouping, so
//! every `plus` must be associative. Targets additionally need an identity.

use std::collections::BTreeMap;

/// A type with an associative combine.
pub trait Semigroup {
    fn plus(&self, other: &Self) -> Self;
}

/// A semigroup with an identity element.
pub trait Monoid: Semigroup + Sized {
    fn zero() -> Self;

    /// Fold an iterator of values, starting from `zero()`.
    fn sum<'a, I>(items: I) -> Self
    where
        Self: 'a,
        I: IntoIterator<Item = &'a Self>,
    {
        items
            .into_iter()
            .fold(Self::zero(), |acc, item| acc.plus(item))
    }

    /// Combine `self` with itself `times` times (`zero()` when `times == 0`).
    fn times(&self, times: u32) -> Self {
        (0..times).fold(Self::zero(), |acc, _| acc.plus(self))
    }
}

/// Instance weight carried by a target summary.
///
/// Stoppers and splitters use it to decide whether a leaf is worth splitting
/// and whether a branch is empty.
pub trait Weighted {
    fn weight(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.weight() == 0
    }
}

impl Semigroup for u64 {
    fn plus(&self, other: &Self) -> Self {
        self.saturating_add(*other)
    }
}

impl Monoid for u64 {
    fn zero() -> Self {
        0
    }
}

/// A bare count is its own weight.
impl Weighted for u64 {
    fn weight(&self) -> u64 {
        *self
    }
}

impl Semigroup for i64 {
    fn plus(&self, other: &Self) -> Self {
        self.saturating_add(*other)
    }
}

impl Monoid for i64 {
    fn zero() -> Self {
        0
    }
}

/// Key-wise union; values under the same key are combined.
impl<K, V> Semigroup for BTreeMap<K, V>
where
    K: Ord + Clone,
    V: Semigroup + Clone,
{
    fn plus(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for (key, value) in other {
            merged
                .entry(key.clone())
                .and_modify(|existing| *existing = existing.plus(value))
                .or_insert_with(|| value.clone());
        }
        merged
    }
}

impl<K, V> Monoid for BTreeMap<K, V>
where
    K: Ord + Clone,
    V: Semigroup + Clone,
{
    fn zero() -> Self {
        BTreeMap::new()
    }
}
