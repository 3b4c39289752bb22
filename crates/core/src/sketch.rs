//! Bounded-memory, mergeable quantile sketch over integers.
//!
//! Values are counted in dyadic buckets `value >> level`. When the number of
//! buckets exceeds the capacity, the level rises and neighbouring buckets are
//! folded together. Counts are exact; only positions lose resolution, by at
//! most `2^level`.
//!
//! For sketches of equal capacity, merging is associative and commutative:
//! the merged level is always the smallest level at or above every input's
//! level at which the combined buckets fit.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::monoid::Semigroup;

const MAX_LEVEL: u32 = 63;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantileSketch {
    capacity: usize,
    level: u32,
    buckets: BTreeMap<i64, u64>,
}

impl QuantileSketch {
    pub const DEFAULT_CAPACITY: usize = 256;

    /// Empty sketch holding at most `capacity` buckets (at least 2).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(2),
            level: 0,
            buckets: BTreeMap::new(),
        }
    }

    pub fn single(value: i64, capacity: usize) -> Self {
        let mut sketch = Self::new(capacity);
        sketch.insert(value);
        sketch
    }

    pub fn insert(&mut self, value: i64) {
        *self.buckets.entry(value >> self.level).or_insert(0) += 1;
        self.compress();
    }

    pub fn count(&self) -> u64 {
        self.buckets.values().sum()
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Approximate `q`-quantile: the lower bound of the first bucket whose
    /// strictly-lower count reaches `q * count`. If no bucket qualifies, one
    /// past the largest bucket is returned, clamped to `i64::MAX`. `None` for
    /// an empty sketch.
    pub fn quantile(&self, q: f64) -> Option<i64> {
        let total = self.count();
        if total == 0 {
            return None;
        }
        let rank = q * total as f64;
        let mut below = 0u64;
        for (bucket, count) in &self.buckets {
            if below as f64 >= rank {
                return Some(self.lower_bound(*bucket));
            }
            below += count;
        }
        self.buckets
            .keys()
            .next_back()
            .map(|bucket| self.upper_bound(*bucket))
    }

    fn lower_bound(&self, bucket: i64) -> i64 {
        bucket << self.level
    }

    /// First value past `bucket`; at level 63 this may not fit in an `i64`.
    fn upper_bound(&self, bucket: i64) -> i64 {
        let past = (i128::from(bucket) + 1) << self.level;
        i64::try_from(past).unwrap_or(i64::MAX)
    }

    fn raise_to(&mut self, level: u32) {
        if level <= self.level {
            return;
        }
        let shift = level - self.level;
        let mut raised = BTreeMap::new();
        for (bucket, count) in std::mem::take(&mut self.buckets) {
            *raised.entry(bucket >> shift).or_insert(0) += count;
        }
        self.buckets = raised;
        self.level = level;
    }

    fn compress(&mut self) {
        while self.buckets.len() > self.capacity && self.level < MAX_LEVEL {
            self.raise_to(self.level + 1);
        }
    }
}

impl Default for QuantileSketch {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl Semigroup for QuantileSketch {
    fn plus(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.capacity = self.capacity.max(other.capacity);
        let mut incoming = other.clone();
        let level = merged.level.max(incoming.level);
        merged.raise_to(level);
        incoming.raise_to(level);
        for (bucket, count) in incoming.buckets {
            *merged.buckets.entry(bucket).or_insert(0) += count;
        }
        merged.compress();
        merged
    }
}
