//! CSV input through a configured, checkpointed classification run.

use anyhow::Result;
use grove_core::{Misclassification, Sampler};
use grove_dataflow::{step_name, CheckpointStore, Engine};
use grove_trainer::config::parse_label_target;
use grove_trainer::{parse_csv, Trainer, TrainerConfig, TrainingPlan};
use tempfile::TempDir;

const CONFIG: &str = r#"
seed = 7

[engine]
partitions = 3
threads = 2

[sampler]
kind = "kfold"
folds = 3

[stopper]
max_in_memory_size = 4
min_leaf_size = 1

[plan]
distributed_steps = 2
local_depth = 2

[checkpoint]
format = "bincode"
"#;

fn csv() -> String {
    let mut content = String::from("id,timestamp,x,colour,target\n");
    for i in 0..12 {
        let colour = if i % 2 == 0 { "red" } else { "blue" };
        let label = if i < 6 { "lo" } else { "hi" };
        content.push_str(&format!("r{i},{i},{i},{colour},{label}\n"));
    }
    content
}

#[test]
fn kfold_run_from_csv_validates_every_row_once() -> Result<()> {
    let root = TempDir::new()?;
    let config: TrainerConfig = toml::from_str(CONFIG)?;
    config.validate()?;
    assert_eq!(config.plan.distributed_steps, 2);

    let instances = parse_csv(&csv(), parse_label_target)?;
    assert_eq!(instances.len(), 12);

    let engine = Engine::new(&config.engine)?;
    let store = CheckpointStore::open(root.path(), config.checkpoint.format)?;
    let trainer = Trainer::new(
        engine.parallelize(instances),
        store,
        config.sampler.build(config.seed)?,
        config.splitter.build(Misclassification)?,
        Misclassification,
        config.stopper.build(),
    )
    .with_options(config.growth_options());
    assert_eq!(trainer.sampler().num_trees(), 3);

    let plan = TrainingPlan::from_config(&config.plan);
    let forest = plan.run(&trainer)?;
    assert_eq!(forest.num_trees(), 3);
    assert_eq!(trainer.store().latest_step()?, Some(plan.stages().len()));
    assert_eq!(trainer.read_forest(&step_name(plan.stages().len()))?, forest);

    // Each row sits in exactly one fold, so it is validated by exactly one tree.
    let error = trainer.validate(&forest).expect("every fold validates something");
    assert_eq!(error.total, 12);
    assert!(error.errors <= error.total);

    let importance = trainer.feature_importance(&forest);
    assert!(importance.keys().all(|name| name == "x" || name == "colour"));
    Ok(())
}
