//! Reference stopper: decisions driven purely by leaf weight.

use serde::{Deserialize, Serialize};

use crate::monoid::Weighted;
use crate::strategy::Stopper;

/// Splits leaves heavier than `min_leaf_size`.
///
/// Leaves heavier than `max_in_memory_size` go through another distributed
/// round; lighter ones are finished locally. When finishing locally, a leaf is
/// subsampled down to roughly `max_in_memory_size` instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyStopper {
    pub max_in_memory_size: u64,
    pub min_leaf_size: u64,
}

impl FrequencyStopper {
    pub fn new(max_in_memory_size: u64, min_leaf_size: u64) -> Self {
        Self {
            max_in_memory_size,
            min_leaf_size,
        }
    }
}

impl<T: Weighted> Stopper<T> for FrequencyStopper {
    fn should_split(&self, target: &T) -> bool {
        target.weight() > self.min_leaf_size
    }

    fn should_split_distributed(&self, target: &T) -> bool {
        target.weight() > self.max_in_memory_size
    }

    fn sampling_rate_to_split_locally(&self, target: &T) -> f64 {
        let weight = target.weight();
        if weight == 0 {
            return 1.0;
        }
        (self.max_in_memory_size as f64 / weight as f64).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_exclusive() {
        let stopper = FrequencyStopper::new(100, 5);
        assert!(!Stopper::<u64>::should_split(&stopper, &5));
        assert!(Stopper::<u64>::should_split(&stopper, &6));
        assert!(!Stopper::<u64>::should_split_distributed(&stopper, &100));
        assert!(Stopper::<u64>::should_split_distributed(&stopper, &101));
    }

    #[test]
    fn sampling_rate_caps_at_one() {
        let stopper = FrequencyStopper::new(100, 5);
        assert_eq!(Stopper::<u64>::sampling_rate_to_split_locally(&stopper, &50), 1.0);
        assert_eq!(Stopper::<u64>::sampling_rate_to_split_locally(&stopper, &400), 0.25);
        assert_eq!(Stopper::<u64>::sampling_rate_to_split_locally(&stopper, &0), 1.0);
    }
}
