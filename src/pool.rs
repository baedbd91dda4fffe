use crate::{
    errors::{CreateError, Rejected},
    model::{PoolMetrics, ShutdownPolicy},
    queue::{Task, TaskRing},
};
use parking_lot::{Condvar, Mutex};
use std::{
    io, mem,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};
use tracing::{debug, trace, warn};

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub min_workers: usize,
    pub max_workers: usize,
    pub queue_capacity: usize,
    /// How often the scaler samples load.
    pub scale_interval: Duration,
    /// How many workers a single tick may add or retire.
    pub scale_step: usize,
    pub shutdown_policy: ShutdownPolicy,
    /// Prefix for worker and scaler thread names.
    pub thread_name: String,
}

impl Default for Config {
    fn default() -> Self {
        let cores = num_cpus::get();
        Self {
            min_workers: cores,
            max_workers: cores * 2,
            queue_capacity: cores * 20,
            scale_interval: Duration::from_secs(3),
            scale_step: 2,
            shutdown_policy: ShutdownPolicy::default(),
            thread_name: "dynpool".into(),
        }
    }
}

impl Config {
    /// Fixed-size pool pinned to the core count; scaling is a no-op.
    pub fn cpu_bound() -> Self {
        let cores = num_cpus::get();
        Self {
            min_workers: cores,
            max_workers: cores,
            queue_capacity: cores * 10,
            ..Default::default()
        }
    }

    /// Wide scaling range for workloads that mostly wait.
    pub fn io_bound() -> Self {
        let cores = num_cpus::get();
        Self {
            min_workers: cores,
            max_workers: cores * 4,
            queue_capacity: cores * 20,
            ..Default::default()
        }
    }

    fn validate(&self) -> Result<(), CreateError> {
        if self.min_workers == 0 || self.min_workers > self.max_workers {
            return Err(CreateError::InvalidWorkerBounds {
                min: self.min_workers,
                max: self.max_workers,
            });
        }
        if self.queue_capacity == 0 {
            return Err(CreateError::ZeroCapacity);
        }
        if self.scale_step == 0 {
            return Err(CreateError::ZeroScaleStep);
        }
        Ok(())
    }
}

/// Everything guarded by the pool-wide lock: the task ring plus the worker
/// accounting the scaler and the workers negotiate over. The busy counter is
/// guarded separately in [`Inner`], not by this lock.
struct PoolState {
    queue: TaskRing,
    live: usize,
    pending_exits: usize,
    shutdown: bool,
}

enum Slot {
    Vacant,
    /// Claimed; the spawn call has not stored the handle yet.
    Reserved,
    Running(thread::JoinHandle<()>),
}

/// Fixed table of `max_workers` slots. A worker is handed its slot index at
/// spawn time and vacates that index when it retires, so the scaler never
/// needs a direct handle to pick a worker for removal.
struct Registry {
    slots: Mutex<Vec<Slot>>,
}

impl Registry {
    fn new(max_workers: usize) -> Self {
        let mut slots = Vec::with_capacity(max_workers);
        slots.resize_with(max_workers, || Slot::Vacant);
        Self {
            slots: Mutex::new(slots),
        }
    }

    fn reserve(&self) -> Option<usize> {
        let mut slots = self.slots.lock();
        let idx = slots.iter().position(|s| matches!(s, Slot::Vacant))?;
        slots[idx] = Slot::Reserved;
        Some(idx)
    }

    fn install(&self, idx: usize, handle: thread::JoinHandle<()>) {
        let mut slots = self.slots.lock();
        if matches!(slots[idx], Slot::Reserved) {
            slots[idx] = Slot::Running(handle);
        }
        // Otherwise the worker already vacated the slot; dropping the handle
        // detaches the finished thread.
    }

    fn cancel(&self, idx: usize) {
        self.slots.lock()[idx] = Slot::Vacant;
    }

    /// Called by a retiring worker for its own index. Dropping its own join
    /// handle detaches the (almost finished) thread.
    fn release(&self, idx: usize) {
        self.slots.lock()[idx] = Slot::Vacant;
    }

    fn take_handles(&self) -> Vec<thread::JoinHandle<()>> {
        let mut slots = self.slots.lock();
        slots
            .iter_mut()
            .filter_map(|slot| match mem::replace(slot, Slot::Vacant) {
                Slot::Running(handle) => Some(handle),
                _ => None,
            })
            .collect()
    }
}

struct Inner {
    config: Config,
    state: Mutex<PoolState>,
    not_full: Condvar,
    not_empty: Condvar,
    /// Interrupts the scaler's tick sleep on shutdown.
    scaler_tick: Condvar,
    busy: Mutex<usize>,
    registry: Registry,
    scaler: Mutex<Option<thread::JoinHandle<()>>>,
    submitted: AtomicUsize,
    completed: AtomicUsize,
    panicked: AtomicUsize,
    discarded: AtomicUsize,
}

impl Inner {
    fn run_task(&self, task: Task) {
        *self.busy.lock() += 1;
        let outcome = panic::catch_unwind(AssertUnwindSafe(task));
        *self.busy.lock() -= 1;
        if outcome.is_ok() {
            self.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.panicked.fetch_add(1, Ordering::Relaxed);
            warn!("task panicked; worker keeps running");
        }
    }
}

fn worker_loop(inner: Arc<Inner>, slot: usize) {
    trace!(slot, "worker started");
    loop {
        let mut state = inner.state.lock();
        while state.queue.is_empty() && !state.shutdown {
            inner.not_empty.wait(&mut state);
            // Exit requests are honored before the queue is checked again.
            if state.pending_exits > 0 {
                state.pending_exits -= 1;
                if state.live > inner.config.min_workers {
                    state.live -= 1;
                    drop(state);
                    inner.registry.release(slot);
                    trace!(slot, "worker retired");
                    return;
                }
            }
        }
        if state.shutdown {
            if inner.config.shutdown_policy == ShutdownPolicy::Drain {
                while let Some(task) = state.queue.pop() {
                    drop(state);
                    inner.run_task(task);
                    state = inner.state.lock();
                }
            }
            state.live -= 1;
            trace!(slot, "worker stopped");
            return;
        }
        // The wait loop above guarantees work is available here.
        if let Some(task) = state.queue.pop() {
            inner.not_full.notify_one();
            drop(state);
            inner.run_task(task);
        }
    }
}

fn scaler_loop(inner: Arc<Inner>) {
    let interval = inner.config.scale_interval;
    debug!(?interval, "scaler started");
    loop {
        let mut state = inner.state.lock();
        inner.scaler_tick.wait_for(&mut state, interval);
        if state.shutdown {
            break;
        }
        let queue_len = state.queue.len();
        let live = state.live;
        let busy = *inner.busy.lock();

        let want_grow = if queue_len > live && live < inner.config.max_workers {
            inner.config.scale_step.min(inner.config.max_workers - live)
        } else {
            0
        };

        if busy * 2 < live && live > inner.config.min_workers {
            // Request volunteer exits from idle workers; clamped so the
            // exits never take live below min.
            let step = inner
                .config
                .scale_step
                .min(live - inner.config.min_workers);
            state.pending_exits = step;
            debug!(busy, live, step, "scaling down");
            for _ in 0..step {
                inner.not_empty.notify_one();
            }
        }
        drop(state);

        if want_grow > 0 {
            debug!(queue_len, live, grow = want_grow, "scaling up");
            for _ in 0..want_grow {
                if let Err(err) = spawn_worker(&inner) {
                    warn!(error = %err, "worker thread failed to start");
                }
            }
        }
    }
    debug!("scaler stopped");
}

fn spawn_worker(inner: &Arc<Inner>) -> io::Result<bool> {
    let Some(slot) = inner.registry.reserve() else {
        // Every slot taken: live is already at max.
        return Ok(false);
    };
    {
        let mut state = inner.state.lock();
        if state.shutdown {
            drop(state);
            inner.registry.cancel(slot);
            return Ok(false);
        }
        state.live += 1;
    }
    let name = format!("{}-worker-{}", inner.config.thread_name, slot);
    let entry = {
        let inner = Arc::clone(inner);
        move || worker_loop(inner, slot)
    };
    match thread::Builder::new().name(name).spawn(entry) {
        Ok(handle) => {
            inner.registry.install(slot, handle);
            Ok(true)
        }
        Err(err) => {
            inner.state.lock().live -= 1;
            inner.registry.cancel(slot);
            Err(err)
        }
    }
}

/// A dynamically sized worker pool over a bounded FIFO queue.
///
/// Submission blocks while the queue is full. A background scaler grows the
/// pool toward `max_workers` when the queue outpaces the workers and shrinks
/// it toward `min_workers` when most workers sit idle. Shutdown is
/// cooperative and joins every pool thread before returning.
pub struct ThreadPool {
    inner: Arc<Inner>,
}

impl ThreadPool {
    pub fn new(
        min_workers: usize,
        max_workers: usize,
        queue_capacity: usize,
    ) -> Result<Self, CreateError> {
        Self::with_config(Config {
            min_workers,
            max_workers,
            queue_capacity,
            ..Config::default()
        })
    }

    pub fn with_config(config: Config) -> Result<Self, CreateError> {
        config.validate()?;
        let inner = Arc::new(Inner {
            state: Mutex::new(PoolState {
                queue: TaskRing::with_capacity(config.queue_capacity),
                live: 0,
                pending_exits: 0,
                shutdown: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            scaler_tick: Condvar::new(),
            busy: Mutex::new(0),
            registry: Registry::new(config.max_workers),
            scaler: Mutex::new(None),
            submitted: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            panicked: AtomicUsize::new(0),
            discarded: AtomicUsize::new(0),
            config,
        });

        // The scaler starts before any worker; if it cannot be spawned the
        // pool is not handed out.
        let scaler = thread::Builder::new()
            .name(format!("{}-scaler", inner.config.thread_name))
            .spawn({
                let inner = Arc::clone(&inner);
                move || scaler_loop(inner)
            })?;
        *inner.scaler.lock() = Some(scaler);

        // A failed worker spawn is non-fatal here, same as during growth.
        for _ in 0..inner.config.min_workers {
            if let Err(err) = spawn_worker(&inner) {
                warn!(error = %err, "worker thread failed to start");
            }
        }
        debug!(
            min = inner.config.min_workers,
            max = inner.config.max_workers,
            capacity = inner.config.queue_capacity,
            "pool started"
        );
        Ok(Self { inner })
    }

    /// Hand a task to the pool, blocking while the queue is full. On
    /// shutdown-rejection the closure is returned inside the error.
    pub fn submit<F>(&self, f: F) -> Result<(), Rejected>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_boxed(Box::new(f))
    }

    pub fn submit_boxed(&self, task: Task) -> Result<(), Rejected> {
        let mut state = self.inner.state.lock();
        while state.queue.is_full() && !state.shutdown {
            self.inner.not_full.wait(&mut state);
        }
        if state.shutdown {
            return Err(Rejected::new(task));
        }
        state.queue.push(task);
        self.inner.submitted.fetch_add(1, Ordering::Relaxed);
        drop(state);
        self.inner.not_empty.notify_one();
        Ok(())
    }

    /// Workers currently executing a task.
    pub fn busy_count(&self) -> usize {
        *self.inner.busy.lock()
    }

    /// Workers currently running, idle or executing.
    pub fn live_count(&self) -> usize {
        self.inner.state.lock().live
    }

    pub fn queue_len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn metrics(&self) -> PoolMetrics {
        let (live_workers, queued_tasks) = {
            let state = self.inner.state.lock();
            (state.live, state.queue.len())
        };
        PoolMetrics {
            live_workers,
            busy_workers: *self.inner.busy.lock(),
            queued_tasks,
            submitted: self.inner.submitted.load(Ordering::Relaxed),
            completed: self.inner.completed.load(Ordering::Relaxed),
            panicked: self.inner.panicked.load(Ordering::Relaxed),
            discarded: self.inner.discarded.load(Ordering::Relaxed),
        }
    }

    /// Stop the pool: flip the shutdown flag, wake every parked thread, join
    /// the scaler, then join every still-registered worker. What happens to
    /// queued-but-undispatched tasks is governed by
    /// [`Config::shutdown_policy`]. Blocks until all pool threads are gone;
    /// later calls return immediately.
    pub fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
        }
        debug!("pool shutting down");
        // Every parked thread must observe the flag, hence broadcast.
        self.inner.not_empty.notify_all();
        self.inner.not_full.notify_all();
        self.inner.scaler_tick.notify_all();

        if let Some(handle) = self.inner.scaler.lock().take() {
            let _ = handle.join();
        }
        for handle in self.inner.registry.take_handles() {
            let _ = handle.join();
        }

        // Dispose of anything still queued and account for it.
        let leftover = {
            let mut state = self.inner.state.lock();
            state.queue.drain()
        };
        if !leftover.is_empty() {
            self.inner
                .discarded
                .fetch_add(leftover.len(), Ordering::Relaxed);
            debug!(count = leftover.len(), "discarding undispatched tasks");
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
