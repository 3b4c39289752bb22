//! Temporal holdout: validate on the latest slice of the timeline.

use grove_core::{
    ErrorMetric, OutOfTimeSampler, QuantileSketch, Sampler, Semigroup, Splitter, Stopper, Target,
};
use tracing::info;

use crate::config::validate_quantile;
use crate::errors::{Result, TrainerError};
use crate::trainer::Trainer;

/// Timestamp quantile at which the holdout starts when none is given.
pub const DEFAULT_HOLDOUT_QUANTILE: f64 = 0.8;

impl<T, S, Sp, M, St> Trainer<T, S, Sp, M, St>
where
    T: Target,
    S: Sampler,
    Sp: Splitter<T>,
    M: ErrorMetric<T>,
    St: Stopper<T>,
{
    /// Approximate `quantile` of the training timestamps.
    pub fn timestamp_quantile(&self, quantile: f64) -> Result<i64> {
        validate_quantile(quantile)?;
        let capacity = self.options.sketch_capacity;
        let sketch = self
            .data
            .map(|instance| QuantileSketch::single(instance.timestamp, capacity))
            .reduce(|a, b| a.plus(b))
            .ok_or(TrainerError::EmptyTrainingSet)?;
        sketch
            .quantile(quantile)
            .ok_or(TrainerError::EmptyTrainingSet)
    }

    /// Hold out every instance at or after the `quantile` timestamp.
    ///
    /// Earlier instances keep training under the current sampler. The forest
    /// and checkpoints are untouched; only the sampler changes.
    pub fn out_of_time(self, quantile: f64) -> Result<Trainer<T, OutOfTimeSampler<S>, Sp, M, St>> {
        let threshold = self.timestamp_quantile(quantile)?;
        let held_out = self
            .data
            .map(|instance| u64::from(instance.timestamp >= threshold))
            .reduce(|a, b| a + b)
            .unwrap_or(0);
        info!(
            quantile,
            threshold,
            held_out,
            total = self.data.len(),
            "temporal holdout threshold"
        );

        Ok(Trainer {
            data: self.data,
            store: self.store,
            sampler: OutOfTimeSampler::new(self.sampler, threshold),
            splitter: self.splitter,
            metric: self.metric,
            stopper: self.stopper,
            options: self.options,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::TrainerError;
    use crate::trainer::tests::{instance, scenario, trainer, EveryTree};
    use crate::trainer::GrowthOptions;
    use grove_core::Sampler;
    use tempfile::TempDir;

    #[test]
    fn median_of_four_timestamps_holds_out_the_later_half() -> crate::errors::Result<()> {
        let dir = TempDir::new().expect("tempdir");
        let trainer = trainer(&dir, EveryTree(1), scenario()).out_of_time(0.5)?;
        assert_eq!(trainer.sampler().threshold(), 3);

        let held_out = scenario()
            .iter()
            .filter(|i| trainer.sampler().include_in_validation_set(&i.id, i.timestamp, 0))
            .count();
        assert_eq!(held_out, 2);
        assert_eq!(trainer.sampler().times_in_training_set("a", 1, 0), 1);
        assert_eq!(trainer.sampler().times_in_training_set("d", 4, 0), 0);
        Ok(())
    }

    #[test]
    fn empty_training_set_is_an_error() {
        let dir = TempDir::new().expect("tempdir");
        let result = trainer(&dir, EveryTree(1), Vec::new()).out_of_time(0.8);
        assert!(matches!(result, Err(TrainerError::EmptyTrainingSet)));
    }

    #[test]
    fn rejects_quantile_outside_unit_interval() {
        let dir = TempDir::new().expect("tempdir");
        let trainer = trainer(&dir, EveryTree(1), scenario());
        assert!(matches!(
            trainer.timestamp_quantile(0.0),
            Err(TrainerError::Config(_))
        ));
        assert_eq!(trainer.timestamp_quantile(1.0).ok(), Some(5));
    }

    #[test]
    fn full_quantile_over_extreme_timestamps_holds_out_nothing() -> crate::errors::Result<()> {
        let dir = TempDir::new().expect("tempdir");
        let data = vec![
            instance("a", i64::MIN, 1, 5, 10),
            instance("b", -1, 2, 3, 12),
            instance("c", 0, 10, 5, 100),
            instance("d", 5, 11, 3, 102),
        ];
        let options = GrowthOptions {
            sketch_capacity: 2,
            ..GrowthOptions::default()
        };
        let trainer = trainer(&dir, EveryTree(1), data.clone())
            .with_options(options)
            .out_of_time(1.0)?;
        assert_eq!(trainer.sampler().threshold(), i64::MAX);
        assert!(data
            .iter()
            .all(|i| !trainer.sampler().include_in_validation_set(&i.id, i.timestamp, 0)));
        Ok(())
    }
}
