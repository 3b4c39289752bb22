//! Split candidates and the rule that picks between them.

use grove_core::Split;

/// Best split found for one leaf on one feature.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<T, E> {
    pub feature: String,
    pub split: Split<T>,
    pub error: E,
}

/// Keep `current` only if its error is strictly smaller than `next`'s.
///
/// Equal or incomparable errors resolve to `next`, so the outcome of a tie
/// depends on the order in which candidates are combined.
pub fn select_best<T: Clone, E: PartialOrd + Clone>(
    current: &Candidate<T, E>,
    next: &Candidate<T, E>,
) -> Candidate<T, E> {
    if current.error < next.error {
        current.clone()
    } else {
        next.clone()
    }
}
