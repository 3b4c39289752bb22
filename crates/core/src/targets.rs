//! Target summaries: commutative monoids accumulated at leaves.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::errors::{CoreError, Result};
use crate::monoid::{Monoid, Semigroup, Weighted};

/// Everything the growth engine needs from a leaf target.
pub trait Target:
    Monoid + Weighted + Clone + PartialEq + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

impl<T> Target for T where
    T: Monoid
        + Weighted
        + Clone
        + PartialEq
        + Debug
        + Send
        + Sync
        + Serialize
        + DeserializeOwned
        + 'static
{
}

/// Count, sum and sum of squares of fixed-point regression targets.
///
/// All arithmetic is integer, so combining is exactly associative and
/// commutative regardless of how partial sums are grouped. Exactness holds
/// for observations within [`Moments::MAX_MAGNITUDE`]: `sum_sq` then stays
/// below 2^126 for any `u64` count. Beyond that, sums saturate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Moments {
    pub count: u64,
    pub sum: i128,
    pub sum_sq: i128,
}

impl Moments {
    /// Largest absolute observation accepted by [`Moments::try_observe`].
    pub const MAX_MAGNITUDE: i64 = 1 << 31;

    /// Summary of a single observation, rejecting values outside
    /// `[-MAX_MAGNITUDE, MAX_MAGNITUDE]`.
    pub fn try_observe(value: i64) -> Result<Self> {
        if value.unsigned_abs() > Self::MAX_MAGNITUDE as u64 {
            return Err(CoreError::TargetOutOfRange {
                value,
                bound: Self::MAX_MAGNITUDE,
            });
        }
        Ok(Self::observe(value))
    }

    /// Summary of a single observation.
    pub fn observe(value: i64) -> Self {
        let value = value as i128;
        Self {
            count: 1,
            sum: value,
            sum_sq: value * value,
        }
    }

    /// Integer mean, truncated toward zero.
    pub fn mean(&self) -> Option<i128> {
        (self.count > 0).then(|| self.sum / self.count as i128)
    }
}

impl Semigroup for Moments {
    fn plus(&self, other: &Self) -> Self {
        Self {
            count: self.count.saturating_add(other.count),
            sum: self.sum.saturating_add(other.sum),
            sum_sq: self.sum_sq.saturating_add(other.sum_sq),
        }
    }
}

impl Monoid for Moments {
    fn zero() -> Self {
        Self::default()
    }
}

impl Weighted for Moments {
    fn weight(&self) -> u64 {
        self.count
    }
}

/// Per-label instance counts for classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelCounts(pub BTreeMap<String, u64>);

impl LabelCounts {
    pub fn single(label: impl Into<String>) -> Self {
        let mut counts = BTreeMap::new();
        counts.insert(label.into(), 1);
        Self(counts)
    }

    pub fn count(&self, label: &str) -> u64 {
        self.0.get(label).copied().unwrap_or(0)
    }

    /// Most frequent label; ties resolve to the lexicographically smallest.
    pub fn majority(&self) -> Option<&str> {
        let mut best: Option<(&str, u64)> = None;
        for (label, count) in &self.0 {
            if best.map_or(true, |(_, top)| *count > top) {
                best = Some((label.as_str(), *count));
            }
        }
        best.map(|(label, _)| label)
    }
}

impl Semigroup for LabelCounts {
    fn plus(&self, other: &Self) -> Self {
        Self(self.0.plus(&other.0))
    }
}

impl Monoid for LabelCounts {
    fn zero() -> Self {
        Self::default()
    }
}

impl Weighted for LabelCounts {
    fn weight(&self) -> u64 {
        self.0.values().sum()
    }
}
