//! Binary splitter over numeric thresholds and categorical equality.

use std::collections::BTreeMap;

use crate::errors::{CoreError, Result};
use crate::instance::FeatureValue;
use crate::monoid::{Monoid, Semigroup, Weighted};
use crate::split::{Predicate, Split};
use crate::strategy::{ErrorMetric, Splitter};
use crate::targets::Target;

/// Target summary per distinct (optionally quantized) feature value.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTargets<T>(pub BTreeMap<FeatureValue, T>);

impl<T: Semigroup + Clone> Semigroup for ValueTargets<T> {
    fn plus(&self, other: &Self) -> Self {
        Self(self.0.plus(&other.0))
    }
}

/// Proposes `value < v` splits for numeric values and `value == c` splits for
/// categorical ones, keeping the candidate with the lowest training error
/// under `metric` (first in value order on ties).
///
/// With a `quant_step`, numeric values are bucketed to multiples of the step
/// before aggregation, bounding the statistic size per leaf and feature.
#[derive(Debug, Clone)]
pub struct BinarySplitter<M> {
    metric: M,
    quant_step: Option<i64>,
}

impl<M> BinarySplitter<M> {
    pub fn new(metric: M) -> Self {
        Self {
            metric,
            quant_step: None,
        }
    }

    pub fn with_quant_step(mut self, step: i64) -> Result<Self> {
        if step <= 0 {
            return Err(CoreError::InvalidParameters(format!(
                "quant_step must be positive, got {step}"
            )));
        }
        self.quant_step = Some(step);
        Ok(self)
    }

    fn quantize(&self, value: &FeatureValue) -> FeatureValue {
        match (value, self.quant_step) {
            (FeatureValue::Numeric(v), Some(step)) => FeatureValue::Numeric(v.div_euclid(step) * step),
            _ => value.clone(),
        }
    }
}

fn candidates<T: Target>(stat: &ValueTargets<T>) -> Vec<Split<T>> {
    let values: Vec<(&FeatureValue, &T)> = stat.0.iter().collect();
    let n = values.len();

    // prefix[i] sums values[..i], suffix[i] sums values[i..]
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(T::zero());
    for (_, target) in &values {
        let next = prefix[prefix.len() - 1].plus(target);
        prefix.push(next);
    }
    let mut suffix = vec![T::zero(); n + 1];
    for i in (0..n).rev() {
        suffix[i] = values[i].1.plus(&suffix[i + 1]);
    }

    let mut out = Vec::new();
    for (i, (value, target)) in values.iter().enumerate() {
        match value {
            FeatureValue::Numeric(_) if i > 0 => out.push(Split::binary(
                Predicate::LessThan((*value).clone()),
                prefix[i].clone(),
                suffix[i].clone(),
            )),
            FeatureValue::Numeric(_) => {}
            FeatureValue::Categorical(_) => out.push(Split::binary(
                Predicate::EqualTo((*value).clone()),
                (*target).clone(),
                prefix[i].plus(&suffix[i + 1]),
            )),
        }
    }
    out
}

impl<T, M> Splitter<T> for BinarySplitter<M>
where
    T: Target,
    M: ErrorMetric<T>,
{
    type Stat = ValueTargets<T>;

    fn create(&self, value: &FeatureValue, target: &T) -> Self::Stat {
        let mut map = BTreeMap::new();
        map.insert(self.quantize(value), target.clone());
        ValueTargets(map)
    }

    fn split(&self, _parent: &T, stat: &Self::Stat) -> Option<Split<T>> {
        let mut best: Option<(Split<T>, M::Value)> = None;
        for candidate in candidates(stat) {
            if candidate.predicates.iter().any(|(_, target)| target.is_empty()) {
                continue;
            }
            let Some(error) = self.metric.training_error(&candidate) else {
                continue;
            };
            match &best {
                Some((_, current)) if !(error < *current) => {}
                _ => best = Some((candidate, error)),
            }
        }
        best.map(|(split, _)| split)
    }
}
