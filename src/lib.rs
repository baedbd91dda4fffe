//! Dynamically sized thread pool over a bounded FIFO task queue.
//!
//! # Features
//! - Bounded circular task queue; producers block while it is full
//! - Worker count scales between a configured min and max, driven by a
//!   background sampler watching queue depth and worker utilization
//! - Volunteer-based shrinking: only idle workers retire themselves
//! - Configurable shutdown: discard or drain undispatched tasks
//! - Per-task panic isolation and pool-level metrics

pub mod errors;
pub mod model;
pub mod pool;
pub mod queue;

pub use errors::{CreateError, Rejected};
pub use model::{PoolMetrics, ShutdownPolicy};
pub use pool::{Config, ThreadPool};
pub use queue::Task;
