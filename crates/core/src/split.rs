//! Feature predicates and proposed splits.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::instance::FeatureValue;

/// A test applied to a (possibly missing) feature value.
///
/// A missing value never satisfies `EqualTo` or `LessThan`, so it always
/// follows the `Not` branch of a binary split.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Predicate {
    EqualTo(FeatureValue),
    LessThan(FeatureValue),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn matches(&self, value: Option<&FeatureValue>) -> bool {
        match self {
            Predicate::EqualTo(expected) => value == Some(expected),
            Predicate::LessThan(bound) => value.map_or(false, |v| v < bound),
            Predicate::Not(inner) => !inner.matches(value),
        }
    }

    pub fn negate(self) -> Predicate {
        match self {
            Predicate::Not(inner) => *inner,
            other => Predicate::Not(Box::new(other)),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::EqualTo(value) => write!(f, "== {value}"),
            Predicate::LessThan(value) => write!(f, "< {value}"),
            Predicate::Not(inner) => write!(f, "not ({inner})"),
        }
    }
}

/// A proposed partition of a leaf: one child target per predicate.
///
/// Predicates of a split are expected to be mutually exclusive and
/// exhaustive, so every feature vector matches exactly one branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split<T> {
    pub predicates: Vec<(Predicate, T)>,
}

impl<T> Split<T> {
    /// Binary split on `predicate` and its negation.
    pub fn binary(predicate: Predicate, matched: T, unmatched: T) -> Self {
        let negated = predicate.clone().negate();
        Self {
            predicates: vec![(predicate, matched), (negated, unmatched)],
        }
    }

    pub fn branch_for(&self, value: Option<&FeatureValue>) -> Option<usize> {
        self.predicates
            .iter()
            .position(|(predicate, _)| predicate.matches(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_take_negated_branch() {
        let split = Split::binary(Predicate::LessThan(FeatureValue::Numeric(10)), 1u64, 2u64);
        assert_eq!(split.branch_for(Some(&FeatureValue::Numeric(3))), Some(0));
        assert_eq!(split.branch_for(Some(&FeatureValue::Numeric(10))), Some(1));
        assert_eq!(split.branch_for(None), Some(1));
    }

    #[test]
    fn double_negation_unwraps() {
        let predicate = Predicate::EqualTo(FeatureValue::from("red"));
        assert_eq!(predicate.clone().negate().negate(), predicate);
    }

    #[test]
    fn equality_predicate_matches_only_its_category() {
        let predicate = Predicate::EqualTo(FeatureValue::from("red"));
        assert!(predicate.matches(Some(&FeatureValue::from("red"))));
        assert!(!predicate.matches(Some(&FeatureValue::from("blue"))));
        assert!(!predicate.matches(None));
    }
}
