//! Reference error metrics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::monoid::{Monoid, Semigroup, Weighted};
use crate::strategy::ErrorMetric;
use crate::targets::{LabelCounts, Moments};

/// Sum of squared errors against the averaged tree means.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SquaredError;

/// Accumulated squared error. Orders by `sse`, then by `count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SumSquaredError {
    pub sse: i128,
    pub count: u64,
}

impl SumSquaredError {
    pub fn mean_squared_error(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sse as f64 / self.count as f64)
    }
}

impl Semigroup for SumSquaredError {
    fn plus(&self, other: &Self) -> Self {
        Self {
            sse: self.sse.saturating_add(other.sse),
            count: self.count.saturating_add(other.count),
        }
    }
}

impl Monoid for SumSquaredError {
    fn zero() -> Self {
        Self::default()
    }
}

impl ErrorMetric<Moments> for SquaredError {
    type Value = SumSquaredError;

    /// Predictions without observations are ignored; if none remain the
    /// prediction is zero.
    fn create(&self, actual: &Moments, predictions: &[Moments]) -> SumSquaredError {
        let means: Vec<i128> = predictions.iter().filter_map(Moments::mean).collect();
        let prediction = if means.is_empty() {
            0
        } else {
            means.iter().fold(0i128, |acc, mean| acc.saturating_add(*mean)) / means.len() as i128
        };
        // sum((y - p)^2) expanded over the accumulated moments
        let count = actual.count as i128;
        let cross = prediction.saturating_mul(actual.sum).saturating_mul(2);
        let spread = count.saturating_mul(prediction).saturating_mul(prediction);
        let sse = actual.sum_sq.saturating_sub(cross).saturating_add(spread);
        SumSquaredError {
            sse,
            count: actual.count,
        }
    }
}

/// Majority-vote misclassification count.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Misclassification;

/// Misclassified and total weight. Orders by `errors`, then by `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorRate {
    pub errors: u64,
    pub total: u64,
}

impl ErrorRate {
    pub fn rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.errors as f64 / self.total as f64)
    }
}

impl Semigroup for ErrorRate {
    fn plus(&self, other: &Self) -> Self {
        Self {
            errors: self.errors + other.errors,
            total: self.total + other.total,
        }
    }
}

impl Monoid for ErrorRate {
    fn zero() -> Self {
        Self::default()
    }
}

impl ErrorMetric<LabelCounts> for Misclassification {
    type Value = ErrorRate;

    /// Each prediction votes for its majority label; the label with most
    /// votes (lexicographically smallest on ties) is the forest's answer.
    fn create(&self, actual: &LabelCounts, predictions: &[LabelCounts]) -> ErrorRate {
        let mut votes: BTreeMap<&str, u64> = BTreeMap::new();
        for label in predictions.iter().filter_map(LabelCounts::majority) {
            *votes.entry(label).or_insert(0) += 1;
        }
        let mut winner: Option<(&str, u64)> = None;
        for (label, count) in votes {
            if winner.map_or(true, |(_, top)| count > top) {
                winner = Some((label, count));
            }
        }

        let total = actual.weight();
        let correct = winner.map_or(0, |(label, _)| actual.count(label));
        ErrorRate {
            errors: total - correct,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::{Predicate, Split};
    use crate::instance::FeatureValue;

    #[test]
    fn squared_error_of_single_observation() {
        let error = SquaredError.create(&Moments::observe(7), &[Moments::observe(4)]);
        assert_eq!(error.sse, 9);
        assert_eq!(error.count, 1);
    }

    #[test]
    fn squared_error_averages_tree_means() {
        let predictions = [Moments::observe(2), Moments::observe(6), Moments::zero()];
        let error = SquaredError.create(&Moments::observe(4), &predictions);
        assert_eq!(error.sse, 0);
    }

    #[test]
    fn squared_error_saturates_on_extreme_values() {
        let actual = Moments::observe(i64::MIN).plus(&Moments::observe(i64::MIN));
        let error = SquaredError.create(&actual, &[Moments::observe(i64::MAX)]);
        assert_eq!(error.sse, i128::MAX);
        assert_eq!(error.count, 2);
        assert_eq!(error.plus(&error).sse, i128::MAX);
    }

    #[test]
    fn squared_training_error_sums_branches() {
        let left = Moments::observe(10).plus(&Moments::observe(12));
        let right = Moments::observe(100).plus(&Moments::observe(102));
        let split = Split::binary(Predicate::LessThan(FeatureValue::Numeric(5)), left, right);
        let error = SquaredError.training_error(&split).expect("two branches");
        assert_eq!(error.sse, 4);
        assert_eq!(error.count, 4);
        assert_eq!(error.mean_squared_error(), Some(1.0));
    }

    #[test]
    fn misclassification_uses_majority_vote() {
        let actual = LabelCounts::single("yes");
        let predictions = [
            LabelCounts::single("no"),
            LabelCounts::single("yes"),
            LabelCounts::single("yes"),
        ];
        assert_eq!(
            Misclassification.create(&actual, &predictions),
            ErrorRate { errors: 0, total: 1 }
        );
        assert_eq!(
            Misclassification.create(&actual, &[LabelCounts::single("no")]),
            ErrorRate { errors: 1, total: 1 }
        );
        assert_eq!(
            Misclassification.create(&actual, &[]),
            ErrorRate { errors: 1, total: 1 }
        );
    }

    #[test]
    fn misclassification_training_error_counts_minorities() {
        let left = LabelCounts::single("a").plus(&LabelCounts::single("a")).plus(&LabelCounts::single("b"));
        let right = LabelCounts::single("b");
        let split = Split::binary(Predicate::EqualTo(FeatureValue::from("x")), left, right);
        let error = Misclassification.training_error(&split).expect("two branches");
        assert_eq!(error, ErrorRate { errors: 1, total: 4 });
        assert_eq!(error.rate(), Some(0.25));
    }
}
