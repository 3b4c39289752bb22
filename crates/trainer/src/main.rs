//! Grove forest trainer CLI
//!
//! Runs a checkpointed training plan over a CSV dataset and reports
//! validation error and feature importance.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use grove_core::serialization::digest_hex;
use grove_core::{
    ErrorMetric, Forest, LabelCounts, Misclassification, Moments, Sampler, SquaredError, Splitter,
    Stopper, Target,
};
use grove_dataflow::{step_name, CheckpointStore, Engine};
use grove_trainer::config::{parse_label_target, parse_numeric_target};
use grove_trainer::holdout::DEFAULT_HOLDOUT_QUANTILE;
use grove_trainer::{feature_names, feature_stats, load_csv, Trainer, TrainerConfig, TrainingPlan};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "grove-train")]
#[command(author = "Grove Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Checkpointed decision-forest trainer", long_about = None)]
struct Cli {
    /// Verbose logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the training plan, resuming after the latest committed step
    Train(TrainArgs),
    /// Score the latest committed forest without training
    Evaluate(CommonArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Input CSV dataset (id,timestamp,<features...>,target)
    #[arg(short, long)]
    input: PathBuf,

    /// Checkpoint root; step_NN directories and report.json live here
    #[arg(short, long)]
    output: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How the target column is interpreted
    #[arg(long, value_enum, default_value_t = Task::Regression)]
    task: Task,

    /// Seed for hashed sampling decisions
    #[arg(long)]
    seed: Option<u64>,

    /// Number of data partitions
    #[arg(long)]
    partitions: Option<usize>,
}

#[derive(Args, Debug)]
struct TrainArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Number of distributed expand steps
    #[arg(long)]
    steps: Option<usize>,

    /// Depth of locally finished subtrees (0 disables)
    #[arg(long)]
    local_depth: Option<usize>,

    /// Hold out instances at or after this timestamp quantile (0.8 if no value)
    #[arg(long, value_name = "QUANTILE", num_args = 0..=1)]
    out_of_time: Option<Option<f64>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Task {
    /// Integer targets, squared error
    Regression,
    /// Label targets, misclassification rate
    Classification,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Train,
    Evaluate,
}

#[derive(Debug, Serialize)]
struct Report<E> {
    version: &'static str,
    step: usize,
    trees: usize,
    leaves: usize,
    max_depth: usize,
    holdout_threshold: Option<i64>,
    validation: Option<E>,
    importance: BTreeMap<String, E>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    info!("Grove forest trainer v{}", grove_trainer::VERSION);

    match cli.command {
        Command::Train(args) => {
            let config = load_config(&args.common, Some(&args))?;
            dispatch(&args.common, &config, Mode::Train)
        }
        Command::Evaluate(args) => {
            let config = load_config(&args, None)?;
            dispatch(&args, &config, Mode::Evaluate)
        }
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Configuration file (or defaults) with command-line overrides applied.
fn load_config(args: &CommonArgs, train: Option<&TrainArgs>) -> Result<TrainerConfig> {
    let mut config = match &args.config {
        Some(path) => TrainerConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TrainerConfig::default(),
    };

    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(partitions) = args.partitions {
        config.engine.partitions = partitions;
    }
    if let Some(train) = train {
        if let Some(steps) = train.steps {
            config.plan.distributed_steps = steps;
        }
        if let Some(depth) = train.local_depth {
            config.plan.local_depth = depth;
        }
        if let Some(quantile) = train.out_of_time {
            config.plan.out_of_time = Some(quantile.unwrap_or(DEFAULT_HOLDOUT_QUANTILE));
        }
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn dispatch(args: &CommonArgs, config: &TrainerConfig, mode: Mode) -> Result<()> {
    match args.task {
        Task::Regression => run(args, config, mode, parse_numeric_target, SquaredError),
        Task::Classification => run(args, config, mode, parse_label_target, Misclassification),
    }
}

fn run<T, M>(
    args: &CommonArgs,
    config: &TrainerConfig,
    mode: Mode,
    parse_target: fn(&str) -> std::result::Result<T, String>,
    metric: M,
) -> Result<()>
where
    T: Target,
    M: ErrorMetric<T> + Clone,
    M::Value: Serialize,
{
    info!("Loading dataset from: {}", args.input.display());
    let instances = load_csv(&args.input, parse_target).context("Failed to load dataset")?;
    let names = feature_names(&instances);
    info!("Loaded {} instances with {} features", instances.len(), names.len());
    for stats in feature_stats(&instances, &names) {
        debug!(
            "  {}: numeric={} categorical={} missing={}",
            stats.name, stats.numeric, stats.categorical, stats.missing
        );
    }

    let engine = Engine::new(&config.engine).context("Failed to start dataflow engine")?;
    let store = CheckpointStore::open(&args.output, config.checkpoint.format)
        .context("Failed to open checkpoint root")?;
    let sampler = config.sampler.build(config.seed)?;
    let splitter = config.splitter.build(metric.clone())?;

    let trainer = Trainer::new(
        engine.parallelize(instances),
        store,
        sampler,
        splitter,
        metric,
        config.stopper.build(),
    )
    .with_options(config.growth_options());

    match config.plan.out_of_time {
        Some(quantile) => {
            let trainer = trainer.out_of_time(quantile)?;
            let threshold = trainer.sampler().threshold();
            finish(&trainer, config, mode, args, Some(threshold))
        }
        None => finish(&trainer, config, mode, args, None),
    }
}

fn finish<T, S, Sp, M, St>(
    trainer: &Trainer<T, S, Sp, M, St>,
    config: &TrainerConfig,
    mode: Mode,
    args: &CommonArgs,
    holdout_threshold: Option<i64>,
) -> Result<()>
where
    T: Target,
    S: Sampler,
    Sp: Splitter<T>,
    M: ErrorMetric<T>,
    M::Value: Serialize,
    St: Stopper<T>,
{
    let forest: Forest<T> = match mode {
        Mode::Train => {
            let plan = TrainingPlan::from_config(&config.plan);
            info!("Running {} stages", plan.stages().len());
            plan.run(trainer)?
        }
        Mode::Evaluate => {
            let step = trainer
                .store()
                .latest_step()?
                .context("No committed checkpoint to evaluate")?;
            trainer.read_forest(&step_name(step))?
        }
    };
    let step = trainer.store().latest_step()?.unwrap_or(0);

    let validation = trainer.validate(&forest);
    let importance = if config.importance.enabled {
        trainer.feature_importance(&forest)
    } else {
        BTreeMap::new()
    };

    let report = Report {
        version: grove_trainer::VERSION,
        step,
        trees: forest.num_trees(),
        leaves: forest.iter().map(|(_, tree)| tree.leaf_count()).sum(),
        max_depth: forest.iter().map(|(_, tree)| tree.depth()).max().unwrap_or(0),
        holdout_threshold,
        validation,
        importance,
    };

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    let report_path = args.output.join("report.json");
    std::fs::write(&report_path, &json).context("Failed to write report")?;

    info!("Step {} forest: {} trees, {} leaves", report.step, report.trees, report.leaves);
    if let Some(error) = &report.validation {
        info!("Validation error: {:?}", error);
    }
    info!("Report: {} ({})", report_path.display(), digest_hex(json.as_bytes()));
    Ok(())
}
