//! Checkpointed sequences of growth steps
//!
//! Step `N` reads the forest committed as `step_{N-1}` and commits
//! `step_N`. Committed steps are never recomputed, so rerunning a plan after
//! a failure resumes at the first uncommitted step.

use grove_core::{ErrorMetric, Forest, Sampler, Splitter, Stopper, Target};
use grove_dataflow::step_name;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::config::PlanConfig;
use crate::errors::Result;
use crate::trainer::Trainer;

/// One growth step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    UpdateTargets,
    Expand,
    ExpandInMemory { depth: usize },
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::UpdateTargets => write!(f, "update_targets"),
            Stage::Expand => write!(f, "expand"),
            Stage::ExpandInMemory { depth } => write!(f, "expand_in_memory(depth={depth})"),
        }
    }
}

impl Stage {
    pub fn apply<T, S, Sp, M, St>(
        &self,
        trainer: &Trainer<T, S, Sp, M, St>,
        forest: &Forest<T>,
        name: &str,
    ) -> Result<Forest<T>>
    where
        T: Target,
        S: Sampler,
        Sp: Splitter<T>,
        M: ErrorMetric<T>,
        St: Stopper<T>,
    {
        match self {
            Stage::UpdateTargets => trainer.update_targets(forest, name),
            Stage::Expand => trainer.expand(forest, name),
            Stage::ExpandInMemory { depth } => trainer.expand_in_memory(forest, name, *depth),
        }
    }
}

/// Ordered stages; stage `i` produces checkpoint `step_{i+1}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingPlan {
    stages: Vec<Stage>,
}

impl TrainingPlan {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Refresh root targets, run the distributed steps, then finish locally.
    pub fn from_config(plan: &PlanConfig) -> Self {
        let mut stages = vec![Stage::UpdateTargets];
        stages.extend(std::iter::repeat(Stage::Expand).take(plan.distributed_steps));
        if plan.local_depth > 0 {
            stages.push(Stage::ExpandInMemory {
                depth: plan.local_depth,
            });
        }
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run every stage not yet committed and return the final forest.
    pub fn run<T, S, Sp, M, St>(&self, trainer: &Trainer<T, S, Sp, M, St>) -> Result<Forest<T>>
    where
        T: Target,
        S: Sampler,
        Sp: Splitter<T>,
        M: ErrorMetric<T>,
        St: Stopper<T>,
    {
        let (start, mut forest) = match trainer.store().latest_step()? {
            Some(latest) => {
                info!(step = latest, "resuming from committed checkpoint");
                (latest, trainer.read_forest(&step_name(latest))?)
            }
            None => (0, trainer.initialize(&step_name(0))?),
        };
        if start > self.stages.len() {
            warn!(
                latest = start,
                stages = self.stages.len(),
                "checkpoint root is ahead of the plan"
            );
            return Ok(forest);
        }

        for (offset, stage) in self.stages.iter().enumerate().skip(start) {
            let step = offset + 1;
            info!(step, %stage, "running step");
            forest = stage.apply(trainer, &forest, &step_name(step))?;
        }
        Ok(forest)
    }
}

/// Apply one distributed expand for each step in `step..=times`.
///
/// Steps already committed are skipped. Does nothing when `step > times`.
pub fn expand_from<T, S, Sp, M, St>(
    trainer: &Trainer<T, S, Sp, M, St>,
    step: usize,
    times: usize,
) -> Result<()>
where
    T: Target,
    S: Sampler,
    Sp: Splitter<T>,
    M: ErrorMetric<T>,
    St: Stopper<T>,
{
    let mut current = step.max(1);
    while current <= times {
        let name = step_name(current);
        if trainer.store().is_committed(&name) {
            info!(step = current, "step already committed, skipping");
        } else {
            let previous = trainer.read_forest(&step_name(current - 1))?;
            trainer.expand(&previous, &name)?;
        }
        current += 1;
    }
    Ok(())
}

/// `expand_from` starting at the first step.
pub fn expand_times<T, S, Sp, M, St>(trainer: &Trainer<T, S, Sp, M, St>, times: usize) -> Result<()>
where
    T: Target,
    S: Sampler,
    Sp: Splitter<T>,
    M: ErrorMetric<T>,
    St: Stopper<T>,
{
    expand_from(trainer, 1, times)
}
