//! Training configuration loaded from TOML
//!
//! Every section has defaults, so an empty file (or no file at all) yields a
//! runnable single-tree regression setup.

use grove_core::{
    BinarySplitter, FeatureValue, FrequencyStopper, KFoldSampler, RandomForestSampler, Sampler,
    SingleTreeSampler,
};
use grove_dataflow::{EngineConfig, Format};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::errors::{Result, TrainerError};
use crate::trainer::GrowthOptions;

/// Top-level trainer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Seed for every hashed random decision
    pub seed: u64,
    /// Bucket budget of the timestamp quantile sketch
    pub sketch_capacity: usize,
    pub engine: EngineConfig,
    pub sampler: SamplerConfig,
    pub stopper: StopperConfig,
    pub splitter: SplitterConfig,
    pub plan: PlanConfig,
    pub importance: ImportanceConfig,
    pub checkpoint: CheckpointConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            sketch_capacity: grove_core::QuantileSketch::DEFAULT_CAPACITY,
            engine: EngineConfig::default(),
            sampler: SamplerConfig::default(),
            stopper: StopperConfig::default(),
            splitter: SplitterConfig::default(),
            plan: PlanConfig::default(),
            importance: ImportanceConfig::default(),
            checkpoint: CheckpointConfig::default(),
        }
    }
}

/// Sampling strategy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SamplerConfig {
    /// One tree over all instances
    #[default]
    Single,
    /// K-fold cross validation, one tree per fold
    Kfold { folds: usize },
    /// Poisson-bagged random forest
    RandomForest {
        trees: usize,
        feature_rate: f64,
        #[serde(default = "default_sampling_rate")]
        sampling_rate: f64,
    },
}

fn default_sampling_rate() -> f64 {
    1.0
}

impl SamplerConfig {
    pub fn build(&self, seed: u64) -> Result<ConfiguredSampler> {
        Ok(match self {
            SamplerConfig::Single => ConfiguredSampler::Single(SingleTreeSampler),
            SamplerConfig::Kfold { folds } => {
                ConfiguredSampler::KFold(KFoldSampler::new(*folds, seed)?)
            }
            SamplerConfig::RandomForest {
                trees,
                feature_rate,
                sampling_rate,
            } => ConfiguredSampler::RandomForest(RandomForestSampler::new(
                *trees,
                *feature_rate,
                *sampling_rate,
                seed,
            )?),
        })
    }
}

/// Sampler chosen at runtime from configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredSampler {
    Single(SingleTreeSampler),
    KFold(KFoldSampler),
    RandomForest(RandomForestSampler),
}

impl ConfiguredSampler {
    fn inner(&self) -> &dyn Sampler {
        match self {
            ConfiguredSampler::Single(sampler) => sampler,
            ConfiguredSampler::KFold(sampler) => sampler,
            ConfiguredSampler::RandomForest(sampler) => sampler,
        }
    }
}

impl Sampler for ConfiguredSampler {
    fn num_trees(&self) -> usize {
        self.inner().num_trees()
    }

    fn times_in_training_set(&self, id: &str, timestamp: i64, tree: usize) -> u32 {
        self.inner().times_in_training_set(id, timestamp, tree)
    }

    fn include_feature(&self, feature: &str, tree: usize, leaf: usize) -> bool {
        self.inner().include_feature(feature, tree, leaf)
    }

    fn include_in_validation_set(&self, id: &str, timestamp: i64, tree: usize) -> bool {
        self.inner().include_in_validation_set(id, timestamp, tree)
    }
}

/// Leaf-size thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopperConfig {
    /// Leaves at or below this weight are finished locally
    pub max_in_memory_size: u64,
    /// Leaves at or below this weight are never split
    pub min_leaf_size: u64,
}

impl Default for StopperConfig {
    fn default() -> Self {
        Self {
            max_in_memory_size: 10_000,
            min_leaf_size: 10,
        }
    }
}

impl StopperConfig {
    pub fn build(&self) -> FrequencyStopper {
        FrequencyStopper::new(self.max_in_memory_size, self.min_leaf_size)
    }
}

/// Splitter settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    /// Bucket width for numeric feature values
    pub quant_step: Option<i64>,
}

impl SplitterConfig {
    pub fn build<M>(&self, metric: M) -> Result<BinarySplitter<M>> {
        let splitter = BinarySplitter::new(metric);
        Ok(match self.quant_step {
            Some(step) => splitter.with_quant_step(step)?,
            None => splitter,
        })
    }
}

/// Stage layout of a training run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Number of single-level distributed expand steps
    pub distributed_steps: usize,
    /// Depth of the locally grown subtrees; 0 skips local finishing
    pub local_depth: usize,
    /// Leaves with more collected instances are left for distributed steps
    pub max_local_instances: Option<usize>,
    /// Quantile of timestamps at which to start the temporal holdout
    pub out_of_time: Option<f64>,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            distributed_steps: 3,
            local_depth: 4,
            max_local_instances: None,
            out_of_time: None,
        }
    }
}

/// Feature importance estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportanceConfig {
    pub enabled: bool,
    /// Number of shuffled buckets the swap pairs are drawn from
    pub buckets: usize,
}

impl Default for ImportanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buckets: 16,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub format: Format,
}

impl TrainerConfig {
    /// Load and validate a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| TrainerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: TrainerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no training run can honour.
    pub fn validate(&self) -> Result<()> {
        if self.engine.partitions == 0 {
            return Err(invalid("engine.partitions must be at least 1"));
        }
        if self.engine.threads == Some(0) {
            return Err(invalid("engine.threads must be at least 1"));
        }
        if self.sketch_capacity < 2 {
            return Err(invalid("sketch_capacity must be at least 2"));
        }
        if let Some(q) = self.plan.out_of_time {
            validate_quantile(q)?;
        }
        if self.plan.max_local_instances == Some(0) {
            return Err(invalid("plan.max_local_instances must be at least 1"));
        }
        if self.importance.enabled && self.importance.buckets == 0 {
            return Err(invalid("importance.buckets must be at least 1"));
        }
        if let Some(step) = self.splitter.quant_step {
            if step <= 0 {
                return Err(invalid("splitter.quant_step must be positive"));
            }
        }
        // Surfaces sampler parameter errors before any data is loaded.
        self.sampler.build(self.seed)?;
        Ok(())
    }

    pub fn growth_options(&self) -> GrowthOptions {
        GrowthOptions {
            seed: self.seed,
            sketch_capacity: self.sketch_capacity,
            max_local_instances: self.plan.max_local_instances,
            importance_buckets: self.importance.buckets.max(1),
        }
    }
}

pub(crate) fn validate_quantile(q: f64) -> Result<()> {
    if q > 0.0 && q <= 1.0 {
        Ok(())
    } else {
        Err(invalid(format!("quantile must be in (0, 1], got {q}")))
    }
}

fn invalid(message: impl Into<String>) -> TrainerError {
    TrainerError::Config(message.into())
}

/// Parse a regression target cell as a fixed-point integer.
///
/// Magnitudes above `Moments::MAX_MAGNITUDE` are rejected so that leaf sums
/// stay exact.
pub fn parse_numeric_target(raw: &str) -> std::result::Result<grove_core::Moments, String> {
    match FeatureValue::parse(raw) {
        FeatureValue::Numeric(value) => {
            grove_core::Moments::try_observe(value).map_err(|err| err.to_string())
        }
        FeatureValue::Categorical(_) => Err(format!("expected integer target, got {raw:?}")),
    }
}

/// Parse a classification target cell as a label.
pub fn parse_label_target(raw: &str) -> std::result::Result<grove_core::LabelCounts, String> {
    if raw.is_empty() {
        return Err("empty label".to_string());
    }
    Ok(grove_core::LabelCounts::single(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: TrainerConfig = toml::from_str("").expect("parse");
        assert_eq!(config, TrainerConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_sections_and_sampler_kind() {
        let config: TrainerConfig = toml::from_str(
            r#"
            seed = 7

            [engine]
            partitions = 4

            [sampler]
            kind = "random_forest"
            trees = 10
            feature_rate = 0.5

            [plan]
            distributed_steps = 2
            local_depth = 0
            out_of_time = 0.8

            [checkpoint]
            format = "bincode"
            "#,
        )
        .expect("parse");

        assert_eq!(config.seed, 7);
        assert_eq!(config.engine.partitions, 4);
        assert_eq!(
            config.sampler,
            SamplerConfig::RandomForest {
                trees: 10,
                feature_rate: 0.5,
                sampling_rate: 1.0
            }
        );
        assert_eq!(config.plan.out_of_time, Some(0.8));
        assert_eq!(config.checkpoint.format, Format::Bincode);
        assert_eq!(config.stopper, StopperConfig::default());

        let sampler = config.sampler.build(config.seed).expect("sampler");
        assert_eq!(sampler.num_trees(), 10);
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut config = TrainerConfig::default();
        config.plan.out_of_time = Some(1.5);
        assert!(matches!(config.validate(), Err(TrainerError::Config(_))));

        let mut config = TrainerConfig::default();
        config.engine.partitions = 0;
        assert!(config.validate().is_err());

        let mut config = TrainerConfig::default();
        config.sampler = SamplerConfig::Kfold { folds: 1 };
        assert!(matches!(config.validate(), Err(TrainerError::Core(_))));
    }

    #[test]
    fn target_parsers() {
        assert_eq!(parse_numeric_target("12").map(|m| m.sum), Ok(12));
        assert!(parse_numeric_target("abc").is_err());
        assert!(parse_numeric_target("2147483648").is_ok());
        assert!(parse_numeric_target("-9223372036854775808").is_err());
        assert_eq!(parse_label_target("spam").map(|l| l.count("spam")), Ok(1));
        assert!(parse_label_target("").is_err());
    }
}
