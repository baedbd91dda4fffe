use crate::queue::Task;
use std::{fmt, io};
use thiserror::Error;

/// Errors reported while building a pool. No partially started pool is ever
/// returned: on failure every thread spawned so far has already been stopped.
#[derive(Debug, Error)]
pub enum CreateError {
    #[error("invalid worker bounds: min={min}, max={max} (need 0 < min <= max)")]
    InvalidWorkerBounds { min: usize, max: usize },
    #[error("queue capacity must be greater than zero")]
    ZeroCapacity,
    #[error("scale step must be greater than zero")]
    ZeroScaleStep,
    #[error("failed to spawn pool thread")]
    Spawn(#[from] io::Error),
}

/// A task turned away because the pool is shutting down.
///
/// The closure, together with the payload it captures, is handed back
/// untouched: the caller decides whether to run it elsewhere or drop it.
pub struct Rejected {
    task: Task,
}

impl Rejected {
    pub(crate) fn new(task: Task) -> Self {
        Self { task }
    }

    /// Recover ownership of the rejected task.
    pub fn into_task(self) -> Task {
        self.task
    }
}

impl fmt::Debug for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected").finish_non_exhaustive()
    }
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("task rejected: pool is shutting down")
    }
}

impl std::error::Error for Rejected {}
