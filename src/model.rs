/// What happens to queued-but-undispatched tasks when the pool shuts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownPolicy {
    /// Workers stop at once; anything left in the queue is dropped unexecuted
    /// (and counted in [`PoolMetrics::discarded`]).
    #[default]
    Discard,
    /// Workers keep executing until the queue is empty, then stop.
    Drain,
}

/// Point-in-time snapshot of the pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub live_workers: usize,
    pub busy_workers: usize,
    pub queued_tasks: usize,
    pub submitted: usize,
    pub completed: usize,
    pub panicked: usize,
    pub discarded: usize,
}

impl PoolMetrics {
    pub fn utilization(&self) -> f64 {
        if self.live_workers == 0 {
            return 0.0;
        }
        self.busy_workers as f64 / self.live_workers as f64
    }

    pub fn success_rate(&self) -> f64 {
        let finished = self.completed + self.panicked;
        if finished == 0 {
            return 1.0;
        }
        self.completed as f64 / finished as f64
    }

    /// Accepted tasks that have not yet finished, panicked, or been discarded.
    pub fn pending(&self) -> usize {
        self.submitted
            .saturating_sub(self.completed + self.panicked + self.discarded)
    }
}
