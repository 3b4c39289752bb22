//! Execution context: a worker pool and a target partition count.

use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::dataset::Dataset;
use crate::errors::{DataflowError, Result};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of partitions for parallelized input and shuffle output
    pub partitions: usize,
    /// Worker threads; `None` uses one per available core
    pub threads: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            partitions: 8,
            threads: None,
        }
    }
}

/// Shared worker pool. Cloning is cheap; clones share the same pool.
#[derive(Clone)]
pub struct Engine {
    pool: Arc<ThreadPool>,
    partitions: usize,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("partitions", &self.partitions)
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        if config.partitions == 0 {
            return Err(DataflowError::InvalidConfig(
                "partitions must be at least 1".to_string(),
            ));
        }
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("grove-worker-{i}"));
        if let Some(threads) = config.threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build()?;
        debug!(
            partitions = config.partitions,
            threads = pool.current_num_threads(),
            "dataflow engine started"
        );
        Ok(Self {
            pool: Arc::new(pool),
            partitions: config.partitions,
        })
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Split `items` into contiguous partitions, preserving order.
    pub fn parallelize<T: Send + Sync>(&self, items: Vec<T>) -> Dataset<T> {
        let chunk = items.len().div_ceil(self.partitions).max(1);
        let mut partitions: Vec<Vec<T>> = Vec::with_capacity(self.partitions);
        let mut items = items.into_iter().peekable();
        while items.peek().is_some() {
            partitions.push(items.by_ref().take(chunk).collect());
        }
        while partitions.len() < self.partitions {
            partitions.push(Vec::new());
        }
        Dataset::from_partitions(self.clone(), partitions)
    }

    pub(crate) fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}
