//! Bounded worker pool.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info, trace, warn};

use crate::config::PoolConfig;
use crate::utils::catch_panic;

use super::task::{CancelOutcome, TaskEntry};
use super::{PoolError, PoolMetrics, TaskContext, TaskError, TaskHandle, TaskId, TaskStatus};

type TaskBody = Box<dyn FnOnce(&TaskContext) -> Result<(), TaskError> + Send + 'static>;

struct Job {
    entry: Arc<TaskEntry>,
    body: TaskBody,
}

/// Tasks that have been submitted but not yet reached a terminal state.
#[derive(Default)]
struct InFlight {
    tasks: Mutex<HashMap<TaskId, Arc<TaskEntry>>>,
}

impl InFlight {
    fn insert(&self, entry: Arc<TaskEntry>) {
        self.lock().insert(entry.id(), entry);
    }

    fn remove(&self, id: TaskId) {
        self.lock().remove(&id);
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn drain(&self) -> Vec<Arc<TaskEntry>> {
        self.lock().drain().map(|(_, entry)| entry).collect()
    }

    fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, Arc<TaskEntry>>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Tasks waiting for a worker that have not been cancelled.
///
/// The channel itself may still hold cancelled jobs until a worker pops and
/// skips them; those never count against the queue capacity.
#[derive(Default)]
struct QueuedCount(AtomicUsize);

impl QueuedCount {
    fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    fn increment(&self) -> usize {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn decrement(&self) -> usize {
        let previous = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)))
            .unwrap_or_else(|n| n);
        previous.saturating_sub(1)
    }
}

/// Live pool resources; present only between `init` and `shutdown`.
struct PoolState {
    sender: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    exited: Receiver<()>,
    in_flight: Arc<InFlight>,
    queued: Arc<QueuedCount>,
    capacity: usize,
}

/// Summary of a [`TaskPool::shutdown`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// False when the pool was not initialized (repeated shutdown).
    pub was_running: bool,
    /// True when every worker finished within the grace period.
    pub graceful: bool,
    /// Tasks cancelled or interrupted after the grace period ran out.
    pub cancelled: usize,
    /// Workers still busy with an interrupted task when shutdown returned.
    pub detached_workers: usize,
}

impl ShutdownReport {
    const fn idle() -> Self {
        Self {
            was_running: false,
            graceful: true,
            cancelled: 0,
            detached_workers: 0,
        }
    }
}

/// Bounded pool of worker threads with per-task cancellation.
///
/// The pool is an explicit handle rather than a global: create it, call
/// [`init`](Self::init), pass clones to whoever needs to run work off their
/// own thread, and call [`shutdown`](Self::shutdown) when done. After a
/// shutdown the same handle can be initialized again.
///
/// # Back-pressure
///
/// The queue holds `queue_capacity` pending tasks. When it is full,
/// [`submit`](Self::submit) returns [`PoolError::CapacityExceeded`]
/// immediately; it never blocks and never drops a task silently. A queued
/// task that is cancelled frees its slot right away.
#[derive(Clone)]
pub struct TaskPool {
    state: Arc<Mutex<Option<PoolState>>>,
    config: PoolConfig,
    metrics: Arc<PoolMetrics>,
}

impl TaskPool {
    /// Creates an uninitialized pool with default configuration.
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Creates an uninitialized pool.
    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(None)),
            config,
            metrics: Arc::new(PoolMetrics::new()),
        }
    }

    /// Initializes the pool with the configured worker count.
    pub fn start(&self) -> Result<bool, PoolError> {
        self.init(self.config.workers)
    }

    /// Starts `capacity` worker threads.
    ///
    /// Returns `Ok(false)` without changing anything if the pool is already
    /// initialized.
    pub fn init(&self, capacity: usize) -> Result<bool, PoolError> {
        let mut guard = self.lock_state();
        if guard.is_some() {
            debug!(target: "backbone::pool", "Pool already initialized");
            return Ok(false);
        }
        if capacity == 0 {
            return Err(PoolError::InvalidCapacity);
        }

        // Capacity is enforced by `QueuedCount`, so the channel only has to
        // hold live jobs plus cancelled ones not yet skipped by a worker.
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let (exit_tx, exited) = crossbeam_channel::unbounded::<()>();
        let in_flight = Arc::new(InFlight::default());
        let queued = Arc::new(QueuedCount::default());

        let mut workers = Vec::with_capacity(capacity);
        for index in 0..capacity {
            let worker = Worker {
                index,
                receiver: receiver.clone(),
                in_flight: Arc::clone(&in_flight),
                queued: Arc::clone(&queued),
                metrics: Arc::clone(&self.metrics),
                exit: ExitSignal(exit_tx.clone()),
            };
            let handle = thread::Builder::new()
                .name(format!("task-pool-{index}"))
                .spawn(move || worker.run())
                .map_err(PoolError::WorkerSpawn)?;
            workers.push(handle);
        }

        info!(
            target: "backbone::pool",
            workers = capacity,
            queue_capacity = self.config.queue_capacity,
            "Task pool started"
        );

        *guard = Some(PoolState {
            sender,
            workers,
            exited,
            in_flight,
            queued,
            capacity,
        });
        Ok(true)
    }

    /// Queues `task` for execution.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Uninitialized`] before `init` or after `shutdown`
    /// - [`PoolError::CapacityExceeded`] when the queue is full
    pub fn submit<F>(&self, task: F) -> Result<TaskHandle, PoolError>
    where
        F: FnOnce(&TaskContext) -> Result<(), TaskError> + Send + 'static,
    {
        // Submissions are serialized by the state lock; workers and
        // cancellation only ever lower the queued count.
        let guard = self.lock_state();
        let state = guard.as_ref().ok_or(PoolError::Uninitialized)?;

        let queue_capacity = self.config.queue_capacity.max(1);
        if state.queued.get() >= queue_capacity {
            self.metrics.record_rejected();
            warn!(target: "backbone::pool", queue_capacity, "Task queue full, rejecting submission");
            return Err(PoolError::CapacityExceeded { queue_capacity });
        }

        let entry = Arc::new(TaskEntry::new());
        let id = entry.id();
        // Register before queueing so a fast worker cannot finish the task
        // before it is tracked.
        state.in_flight.insert(Arc::clone(&entry));
        let depth = state.queued.increment();

        let job = Job {
            entry: Arc::clone(&entry),
            body: Box::new(task),
        };
        if state.sender.send(job).is_err() {
            state.in_flight.remove(id);
            state.queued.decrement();
            return Err(PoolError::Uninitialized);
        }

        self.metrics.record_submitted(depth as u64);
        trace!(target: "backbone::pool", task = %id, "Task queued");
        Ok(TaskHandle { entry })
    }

    /// Requests cancellation of a task.
    ///
    /// A queued task is guaranteed never to start and stops counting as in
    /// flight or against the queue capacity. A running task has its interrupt
    /// flag raised; it stops only if its body honours the flag. Returns false
    /// if the task had already finished.
    pub fn cancel(&self, handle: &TaskHandle) -> bool {
        // Holding the state lock keeps `shutdown` from tearing the queue down
        // between the status change and the bookkeeping below.
        let guard = self.lock_state();
        match handle.entry.cancel() {
            CancelOutcome::Dequeued => {
                if let Some(state) = guard.as_ref() {
                    state.in_flight.remove(handle.id());
                    let depth = state.queued.decrement();
                    self.metrics.set_queue_depth(depth as u64);
                }
                self.metrics.record_finished(TaskStatus::Cancelled, Duration::ZERO);
                debug!(target: "backbone::pool", task = %handle.id(), "Cancelled queued task");
                true
            }
            CancelOutcome::Interrupted => {
                debug!(target: "backbone::pool", task = %handle.id(), "Interrupt requested");
                true
            }
            CancelOutcome::TooLate => false,
        }
    }

    pub fn status(&self, handle: &TaskHandle) -> TaskStatus {
        handle.status()
    }

    /// Stops the pool.
    ///
    /// New submissions are refused immediately. Queued and running tasks get
    /// up to `grace` to finish; whatever is left afterwards is cancelled
    /// (queued) or interrupted (running) and its workers are detached rather
    /// than killed. The pool always ends up uninitialized, so calling this
    /// again is a no-op and a later `init` starts a fresh pool.
    pub fn shutdown(&self, grace: Duration) -> ShutdownReport {
        let Some(state) = self.lock_state().take() else {
            debug!(target: "backbone::pool", "Shutdown requested on idle pool");
            return ShutdownReport::idle();
        };

        let PoolState {
            sender,
            workers,
            exited,
            in_flight,
            capacity,
            ..
        } = state;

        // Closing the queue lets workers drain what is left and then exit.
        drop(sender);

        let deadline = Instant::now() + grace;
        let mut exited_workers = 0;
        while exited_workers < capacity {
            match exited.recv_deadline(deadline) {
                Ok(()) => exited_workers += 1,
                Err(_) => break,
            }
        }

        let graceful = exited_workers == capacity;
        let mut cancelled = 0;
        if !graceful {
            for entry in in_flight.drain() {
                match entry.cancel() {
                    CancelOutcome::Dequeued => {
                        self.metrics
                            .record_finished(TaskStatus::Cancelled, Duration::ZERO);
                        cancelled += 1;
                    }
                    CancelOutcome::Interrupted => cancelled += 1,
                    CancelOutcome::TooLate => {}
                }
            }
            warn!(
                target: "backbone::pool",
                grace_ms = grace.as_millis() as u64,
                cancelled,
                "Grace period exhausted, forcing shutdown"
            );
        }

        let mut detached_workers = 0;
        for worker in workers {
            if worker.is_finished() {
                if worker.join().is_err() {
                    error!(target: "backbone::pool", "Worker thread panicked");
                }
            } else {
                detached_workers += 1;
            }
        }
        in_flight.clear();

        info!(
            target: "backbone::pool",
            graceful,
            cancelled,
            detached_workers,
            "Task pool shut down"
        );

        ShutdownReport {
            was_running: true,
            graceful,
            cancelled,
            detached_workers,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.lock_state().is_some()
    }

    /// Worker count of the running pool, if initialized.
    pub fn capacity(&self) -> Option<usize> {
        self.lock_state().as_ref().map(|state| state.capacity)
    }

    /// Tasks submitted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.lock_state()
            .as_ref()
            .map_or(0, |state| state.in_flight.len())
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Metrics accumulated across every initialization of this pool.
    pub fn metrics(&self) -> Arc<PoolMetrics> {
        Arc::clone(&self.metrics)
    }

    // The state is replaced wholesale under the lock, so a poisoned lock
    // still holds a consistent value.
    fn lock_state(&self) -> MutexGuard<'_, Option<PoolState>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPool")
            .field("capacity", &self.capacity())
            .field("in_flight", &self.in_flight())
            .field("config", &self.config)
            .finish()
    }
}

/// Notifies shutdown when a worker leaves its loop, however it leaves.
struct ExitSignal(Sender<()>);

impl Drop for ExitSignal {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

struct Worker {
    index: usize,
    receiver: Receiver<Job>,
    in_flight: Arc<InFlight>,
    queued: Arc<QueuedCount>,
    metrics: Arc<PoolMetrics>,
    exit: ExitSignal,
}

impl Worker {
    fn run(self) {
        trace!(target: "backbone::pool", worker = self.index, "Worker started");

        // Ends once the queue is closed and drained.
        for job in self.receiver.iter() {
            self.execute(job);
        }

        trace!(target: "backbone::pool", worker = self.index, "Worker exiting");
        drop(self.exit);
    }

    fn execute(&self, job: Job) {
        let Job { entry, body } = job;
        let id = entry.id();

        // Cancellation already released the queue slot and in-flight entry.
        if !entry.try_start() {
            trace!(target: "backbone::pool", worker = self.index, task = %id, "Skipping cancelled task");
            return;
        }
        let depth = self.queued.decrement();
        self.metrics.set_queue_depth(depth as u64);

        let ctx = TaskContext {
            entry: Arc::clone(&entry),
        };
        let started = Instant::now();
        let status = match catch_panic(|| body(&ctx)) {
            Ok(Ok(())) => TaskStatus::Completed,
            Ok(Err(TaskError::Interrupted)) if entry.is_interrupted() => TaskStatus::Cancelled,
            Ok(Err(err)) => {
                warn!(target: "backbone::pool", worker = self.index, task = %id, error = %err, "Task failed");
                TaskStatus::Failed
            }
            Err(panic) => {
                error!(target: "backbone::pool", worker = self.index, task = %id, panic = %panic, "Task panicked");
                TaskStatus::Failed
            }
        };
        let run_time = started.elapsed();

        self.in_flight.remove(id);
        self.metrics.record_finished(status, run_time);
        entry.finish(status);
        trace!(target: "backbone::pool", worker = self.index, task = %id, ?status, "Task finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WAIT: Duration = Duration::from_secs(5);

    fn small_pool(queue_capacity: usize) -> TaskPool {
        TaskPool::with_config(PoolConfig {
            workers: 2,
            queue_capacity,
            shutdown_grace: Duration::from_secs(1),
        })
    }

    #[test]
    fn test_submit_before_init_fails() {
        let pool = TaskPool::new();
        let err = pool.submit(|_| Ok(())).unwrap_err();
        assert!(matches!(err, PoolError::Uninitialized));
    }

    #[test]
    fn test_init_is_idempotent() {
        let pool = small_pool(8);
        assert!(pool.init(2).unwrap());
        assert!(!pool.init(5).unwrap());
        assert_eq!(pool.capacity(), Some(2));
        pool.shutdown(WAIT);
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let pool = small_pool(8);
        assert!(matches!(pool.init(0), Err(PoolError::InvalidCapacity)));
        assert!(!pool.is_initialized());
    }

    #[test]
    fn test_task_runs_to_completion() {
        let pool = small_pool(8);
        pool.init(2).unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        let task_counter = Arc::clone(&counter);
        let handle = pool
            .submit(move |_| {
                task_counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        assert_eq!(handle.wait(WAIT), Some(TaskStatus::Completed));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(pool.metrics().completed(), 1);
        pool.shutdown(WAIT);
    }

    #[test]
    fn test_failing_and_panicking_tasks_are_failed() {
        let pool = small_pool(8);
        pool.init(1).unwrap();

        let failing = pool
            .submit(|_| Err(TaskError::Failed("bad input".to_string())))
            .unwrap();
        let panicking = pool.submit(|_| panic!("task bug")).unwrap();
        let healthy = pool.submit(|_| Ok(())).unwrap();

        assert_eq!(failing.wait(WAIT), Some(TaskStatus::Failed));
        assert_eq!(panicking.wait(WAIT), Some(TaskStatus::Failed));
        assert_eq!(healthy.wait(WAIT), Some(TaskStatus::Completed));
        assert_eq!(pool.metrics().failed(), 2);
        pool.shutdown(WAIT);
    }

    #[test]
    fn test_full_queue_rejects_submission() {
        let pool = small_pool(1);
        pool.init(1).unwrap();

        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
        let blocker = pool
            .submit(move |_| {
                started_tx.send(()).ok();
                release_rx.recv().ok();
                Ok(())
            })
            .unwrap();
        started_rx.recv_timeout(WAIT).unwrap();

        // One slot in the queue, then it is full.
        let queued = pool.submit(|_| Ok(())).unwrap();
        let err = pool.submit(|_| Ok(())).unwrap_err();
        assert!(matches!(err, PoolError::CapacityExceeded { queue_capacity: 1 }));
        assert_eq!(pool.metrics().rejected(), 1);

        release_tx.send(()).unwrap();
        assert_eq!(blocker.wait(WAIT), Some(TaskStatus::Completed));
        assert_eq!(queued.wait(WAIT), Some(TaskStatus::Completed));
        pool.shutdown(WAIT);
    }

    #[test]
    fn test_cancel_running_task_interrupts_it() {
        let pool = small_pool(8);
        pool.init(1).unwrap();

        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
        let handle = pool
            .submit(move |ctx| {
                started_tx.send(()).ok();
                loop {
                    ctx.checkpoint()?;
                    thread::sleep(Duration::from_millis(1));
                }
            })
            .unwrap();
        started_rx.recv_timeout(WAIT).unwrap();

        assert!(pool.cancel(&handle));
        assert_eq!(handle.wait(WAIT), Some(TaskStatus::Cancelled));
        assert!(!pool.cancel(&handle));
        pool.shutdown(WAIT);
    }

    #[test]
    fn test_shutdown_interrupts_tasks_after_grace() {
        let pool = small_pool(8);
        pool.init(1).unwrap();

        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
        let stubborn = pool
            .submit(move |ctx| {
                started_tx.send(()).ok();
                while !ctx.is_interrupted() {
                    thread::sleep(Duration::from_millis(1));
                }
                Err(TaskError::Interrupted)
            })
            .unwrap();
        started_rx.recv_timeout(WAIT).unwrap();
        let queued = pool.submit(|_| Ok(())).unwrap();

        let report = pool.shutdown(Duration::from_millis(20));
        assert!(report.was_running);
        assert!(!report.graceful);
        assert_eq!(report.cancelled, 2);
        assert!(!pool.is_initialized());

        assert_eq!(stubborn.wait(WAIT), Some(TaskStatus::Cancelled));
        assert_eq!(queued.status(), TaskStatus::Cancelled);
    }

    #[test]
    fn test_cancelled_queued_task_frees_its_slot() {
        let pool = small_pool(1);
        pool.init(1).unwrap();

        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
        let blocker = pool
            .submit(move |_| {
                started_tx.send(()).ok();
                release_rx.recv().ok();
                Ok(())
            })
            .unwrap();
        started_rx.recv_timeout(WAIT).unwrap();

        let ran = Arc::new(AtomicUsize::new(0));
        let cancelled = {
            let ran = Arc::clone(&ran);
            pool.submit(move |_| {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap()
        };
        assert_eq!(pool.in_flight(), 2);

        assert!(pool.cancel(&cancelled));
        assert_eq!(pool.in_flight(), 1);

        // The slot held by the cancelled task is available again.
        let replacement = pool.submit(|_| Ok(())).unwrap();
        assert_eq!(pool.in_flight(), 2);
        assert!(matches!(
            pool.submit(|_| Ok(())),
            Err(PoolError::CapacityExceeded { queue_capacity: 1 })
        ));

        release_tx.send(()).unwrap();
        assert_eq!(blocker.wait(WAIT), Some(TaskStatus::Completed));
        assert_eq!(replacement.wait(WAIT), Some(TaskStatus::Completed));
        assert_eq!(cancelled.status(), TaskStatus::Cancelled);

        assert!(pool.shutdown(WAIT).graceful);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(pool.metrics().cancelled(), 1);
    }

    #[test]
    fn test_unrequested_interrupt_is_failed() {
        let pool = small_pool(8);
        pool.init(1).unwrap();

        let handle = pool.submit(|_| Err(TaskError::Interrupted)).unwrap();
        assert_eq!(handle.wait(WAIT), Some(TaskStatus::Failed));
        assert_eq!(pool.metrics().failed(), 1);
        assert_eq!(pool.metrics().cancelled(), 0);
        pool.shutdown(WAIT);
    }
}
