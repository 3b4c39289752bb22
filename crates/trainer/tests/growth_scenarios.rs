//! End-to-end growth scenarios over a small regression dataset.

use anyhow::Result;
use grove_core::{
    BinarySplitter, FeatureValue, Features, FrequencyStopper, Instance, Moments, Monoid, Node,
    Predicate, Sampler, SquaredError,
};
use grove_dataflow::{step_name, CheckpointStore, Engine, EngineConfig, Format};
use grove_trainer::{expand_from, expand_times, Stage, Trainer, TrainingPlan};
use tempfile::TempDir;

type RegressionTrainer<S> =
    Trainer<Moments, S, BinarySplitter<SquaredError>, SquaredError, FrequencyStopper>;

/// Every tree trains on every instance; nothing is validated.
struct AllInstances(usize);

impl Sampler for AllInstances {
    fn num_trees(&self) -> usize {
        self.0
    }

    fn times_in_training_set(&self, _id: &str, _timestamp: i64, _tree: usize) -> u32 {
        1
    }

    fn include_feature(&self, _feature: &str, _tree: usize, _leaf: usize) -> bool {
        true
    }

    fn include_in_validation_set(&self, _id: &str, _timestamp: i64, _tree: usize) -> bool {
        false
    }
}

/// Only tree 0 ever sees training data.
struct FirstTreeOnly;

impl Sampler for FirstTreeOnly {
    fn num_trees(&self) -> usize {
        2
    }

    fn times_in_training_set(&self, _id: &str, _timestamp: i64, tree: usize) -> u32 {
        u32::from(tree == 0)
    }

    fn include_feature(&self, _feature: &str, _tree: usize, _leaf: usize) -> bool {
        true
    }

    fn include_in_validation_set(&self, _id: &str, _timestamp: i64, _tree: usize) -> bool {
        false
    }
}

fn instance(id: &str, ts: i64, signal: i64, noise: i64, y: i64) -> Instance<Moments> {
    let mut features = Features::new();
    features.insert("signal".to_string(), FeatureValue::Numeric(signal));
    features.insert("noise".to_string(), FeatureValue::Numeric(noise));
    Instance::new(id, ts, features, Moments::observe(y))
}

fn dataset() -> Vec<Instance<Moments>> {
    vec![
        instance("a", 1, 1, 5, 10),
        instance("b", 2, 2, 3, 12),
        instance("c", 3, 10, 5, 100),
        instance("d", 4, 11, 3, 102),
    ]
}

fn trainer<S: Sampler>(root: &TempDir, sampler: S, partitions: usize) -> Result<RegressionTrainer<S>> {
    let engine = Engine::new(&EngineConfig {
        partitions,
        threads: Some(2),
    })?;
    let store = CheckpointStore::open(root.path(), Format::JsonLines)?;
    Ok(Trainer::new(
        engine.parallelize(dataset()),
        store,
        sampler,
        BinarySplitter::new(SquaredError),
        SquaredError,
        FrequencyStopper::new(0, 1),
    ))
}

#[test]
fn one_step_split_on_informative_feature() -> Result<()> {
    let root = TempDir::new()?;
    let trainer = trainer(&root, AllInstances(2), 3)?;

    let forest = trainer.initialize(&step_name(0))?;
    let forest = trainer.update_targets(&forest, &step_name(1))?;
    let forest = trainer.expand(&forest, &step_name(2))?;

    assert_eq!(forest.num_trees(), 2);
    for (_, tree) in forest.iter() {
        let Node::Split(branches) = &tree.root else {
            panic!("root should have split");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].feature, "signal");
        assert_eq!(branches[0].predicate, Predicate::LessThan(FeatureValue::Numeric(10)));

        let sums: Vec<i128> = tree.leaves().iter().map(|leaf| leaf.target.sum).collect();
        assert_eq!(sums, vec![22, 202]);
        assert_eq!(sums.iter().sum::<i128>(), 224);
    }
    Ok(())
}

#[test]
fn tree_without_training_data_is_kept() -> Result<()> {
    let root = TempDir::new()?;
    let trainer = trainer(&root, FirstTreeOnly, 2)?;

    let forest = trainer.initialize(&step_name(0))?;
    let forest = trainer.update_targets(&forest, &step_name(1))?;
    let forest = trainer.expand(&forest, &step_name(2))?;

    let untouched = forest.get(1).expect("tree 1 must survive an empty update");
    assert_eq!(untouched.leaf_count(), 1);
    assert_eq!(untouched.root, Node::leaf(0, Moments::zero()));
    assert_eq!(forest.get(0).map(|tree| tree.leaf_count()), Some(2));

    let committed = trainer.read_forest(&step_name(2))?;
    assert_eq!(committed.num_trees(), 2);
    Ok(())
}

#[test]
fn out_of_time_median_holds_out_half() -> Result<()> {
    let root = TempDir::new()?;
    let trainer = trainer(&root, AllInstances(1), 2)?.out_of_time(0.5)?;
    assert_eq!(trainer.sampler().threshold(), 3);

    let held_out: Vec<String> = dataset()
        .into_iter()
        .filter(|i| trainer.sampler().include_in_validation_set(&i.id, i.timestamp, 0))
        .map(|i| i.id)
        .collect();
    assert_eq!(held_out, vec!["c".to_string(), "d".to_string()]);

    // Training only sees the early half.
    let forest = trainer.initialize(&step_name(0))?;
    let forest = trainer.update_targets(&forest, &step_name(1))?;
    let root_target = forest.get(0).and_then(|tree| tree.leaf_at(0)).map(|leaf| leaf.target);
    assert_eq!(root_target.map(|t| (t.count, t.sum)), Some((2, 22)));

    let error = trainer.validate(&forest).expect("held-out instances");
    assert_eq!(error.count, 2);
    Ok(())
}

#[test]
fn rerunning_a_step_yields_identical_checkpoints() -> Result<()> {
    let first_root = TempDir::new()?;
    let second_root = TempDir::new()?;
    // Different partition layouts must not change the outcome.
    let first = trainer(&first_root, AllInstances(3), 2)?;
    let second = trainer(&second_root, AllInstances(3), 5)?;

    let mut forests = Vec::new();
    for trainer in [&first, &second] {
        let forest = trainer.initialize(&step_name(0))?;
        let forest = trainer.update_targets(&forest, &step_name(1))?;
        forests.push(trainer.expand(&forest, &step_name(2))?);
    }
    assert_eq!(forests[0], forests[1]);

    let a = first.store().manifest(&step_name(2))?;
    let b = second.store().manifest(&step_name(2))?;
    assert_eq!(a.digest, b.digest);
    assert_eq!(a.records, 3);
    Ok(())
}

#[test]
fn expand_times_resumes_after_committed_steps() -> Result<()> {
    let root = TempDir::new()?;
    let trainer = trainer(&root, AllInstances(1), 2)?;

    // step_00 holds refreshed targets so the first expand has weight to split.
    let empty = trainer.initialize("seed")?;
    let refreshed = trainer.update_targets(&empty, &step_name(0))?;
    assert_eq!(refreshed.get(0).map(|tree| tree.leaf_count()), Some(1));

    expand_from(&trainer, 1, 1)?;
    let digest_one = trainer.store().manifest(&step_name(1))?.digest;

    // Step 1 is committed and skipped; step 2 is computed from it.
    expand_times(&trainer, 2)?;
    assert_eq!(trainer.store().manifest(&step_name(1))?.digest, digest_one);
    assert_eq!(trainer.store().latest_step()?, Some(2));

    let forest = trainer.read_forest(&step_name(2))?;
    assert_eq!(forest.get(0).map(|tree| tree.depth()), Some(2));
    Ok(())
}

#[test]
fn expand_from_past_the_end_does_nothing() -> Result<()> {
    let root = TempDir::new()?;
    let trainer = trainer(&root, AllInstances(1), 2)?;
    trainer.initialize(&step_name(0))?;

    expand_from(&trainer, 3, 2)?;
    assert_eq!(trainer.store().latest_step()?, Some(0));
    Ok(())
}

#[test]
fn plan_resumes_from_latest_checkpoint() -> Result<()> {
    let root = TempDir::new()?;
    let trainer = trainer(&root, AllInstances(2), 3)?;
    let plan = TrainingPlan::new(vec![
        Stage::UpdateTargets,
        Stage::Expand,
        Stage::ExpandInMemory { depth: 1 },
    ]);

    let short = TrainingPlan::new(plan.stages()[..2].to_vec());
    let partial = short.run(&trainer)?;
    assert_eq!(trainer.store().latest_step()?, Some(2));
    let digest_two = trainer.store().manifest(&step_name(2))?.digest;

    let full = plan.run(&trainer)?;
    assert_eq!(trainer.store().latest_step()?, Some(3));
    assert_eq!(trainer.store().manifest(&step_name(2))?.digest, digest_two);
    assert_eq!(full.num_trees(), 2);
    assert_eq!(partial.get(0).map(|tree| tree.leaf_count()), Some(2));

    // Rerunning a finished plan recomputes nothing.
    let again = plan.run(&trainer)?;
    assert_eq!(again, full);
    Ok(())
}
