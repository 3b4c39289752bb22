//! Training instances and feature values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single feature value.
///
/// Numeric values are fixed-point integers (already scaled by the caller),
/// which keeps routing and split statistics bit-for-bit reproducible.
/// Numeric values order before categorical ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FeatureValue {
    Numeric(i64),
    Categorical(String),
}

impl FeatureValue {
    /// Parse a raw cell: integers become `Numeric`, anything else `Categorical`.
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(value) => FeatureValue::Numeric(value),
            Err(_) => FeatureValue::Categorical(raw.to_string()),
        }
    }

    pub fn as_numeric(&self) -> Option<i64> {
        match self {
            FeatureValue::Numeric(value) => Some(*value),
            FeatureValue::Categorical(_) => None,
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Numeric(value) => write!(f, "{value}"),
            FeatureValue::Categorical(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<i64> for FeatureValue {
    fn from(value: i64) -> Self {
        FeatureValue::Numeric(value)
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        FeatureValue::Categorical(value.to_string())
    }
}

/// Sparse feature vector keyed by feature name. Absent keys are missing values.
pub type Features = BTreeMap<String, FeatureValue>;

/// An immutable training example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance<T> {
    pub id: String,
    pub timestamp: i64,
    pub features: Features,
    pub target: T,
}

impl<T> Instance<T> {
    pub fn new(id: impl Into<String>, timestamp: i64, features: Features, target: T) -> Self {
        Self {
            id: id.into(),
            timestamp,
            features,
            target,
        }
    }
}
