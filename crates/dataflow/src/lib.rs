//! Grove dataflow - local partitioned execution and durable checkpoints
//!
//! A small staged map/shuffle/reduce engine over in-memory partitions, run on
//! a dedicated rayon pool. Shuffles are deterministic for a given partition
//! layout, so re-executing any stage yields identical output. The checkpoint
//! store persists keyed datasets with all-or-nothing commits.

pub mod checkpoint;
pub mod dataset;
pub mod engine;
pub mod errors;

pub use checkpoint::{step_name, CheckpointStore, Format, Manifest};
pub use dataset::Dataset;
pub use engine::{Engine, EngineConfig};
pub use errors::{DataflowError, Result};
