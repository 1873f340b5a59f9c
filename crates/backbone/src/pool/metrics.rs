//! Task pool metrics and statistics.
//!
//! Tracks throughput, outcomes and queue pressure of a [`TaskPool`](super::TaskPool).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::TaskStatus;

/// Counters updated by the pool and its workers.
///
/// Uses atomics for lock-free access across threads.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    /// Tasks accepted by `submit`
    submitted: AtomicU64,

    /// Tasks refused because the queue was full
    rejected: AtomicU64,

    /// Tasks that ran to completion
    completed: AtomicU64,

    /// Tasks that returned an error or panicked
    failed: AtomicU64,

    /// Tasks cancelled before or while running
    cancelled: AtomicU64,

    /// Tasks waiting in the queue at the last submission
    queue_depth: AtomicU64,

    /// Peak queue depth observed
    peak_queue_depth: AtomicU64,

    /// Total time spent running completed tasks, in nanoseconds
    total_run_time_nanos: AtomicU64,
}

impl PoolMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_submitted(&self, queue_depth: u64) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.set_queue_depth(queue_depth);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a task reaching a terminal state.
    pub(crate) fn record_finished(&self, status: TaskStatus, run_time: Duration) {
        match status {
            TaskStatus::Completed => {
                self.completed.fetch_add(1, Ordering::Relaxed);
                self.total_run_time_nanos
                    .fetch_add(run_time.as_nanos() as u64, Ordering::Relaxed);
            }
            TaskStatus::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            TaskStatus::Cancelled => {
                self.cancelled.fetch_add(1, Ordering::Relaxed);
            }
            TaskStatus::Queued | TaskStatus::Running => {}
        }
    }

    /// Updates queue depth and tracks peak.
    pub(crate) fn set_queue_depth(&self, depth: u64) {
        self.queue_depth.store(depth, Ordering::Relaxed);

        // Update peak using compare-and-swap loop
        let mut current_peak = self.peak_queue_depth.load(Ordering::Relaxed);
        while depth > current_peak {
            match self.peak_queue_depth.compare_exchange_weak(
                current_peak,
                depth,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current_peak = actual,
            }
        }
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn queue_depth(&self) -> u64 {
        self.queue_depth.load(Ordering::Relaxed)
    }

    pub fn peak_queue_depth(&self) -> u64 {
        self.peak_queue_depth.load(Ordering::Relaxed)
    }

    /// Average run time of completed tasks.
    pub fn avg_run_time(&self) -> Duration {
        let completed = self.completed();
        if completed == 0 {
            Duration::ZERO
        } else {
            let total_nanos = self.total_run_time_nanos.load(Ordering::Relaxed);
            Duration::from_nanos(total_nanos / completed)
        }
    }

    /// Creates a snapshot of all metrics for display/logging.
    ///
    /// Note: fields are read individually, so the snapshot may be slightly
    /// inconsistent while workers are updating it.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted(),
            rejected: self.rejected(),
            completed: self.completed(),
            failed: self.failed(),
            cancelled: self.cancelled(),
            queue_depth: self.queue_depth(),
            peak_queue_depth: self.peak_queue_depth(),
            avg_run_time: self.avg_run_time(),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub submitted: u64,
    pub rejected: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub queue_depth: u64,
    pub peak_queue_depth: u64,
    pub avg_run_time: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_queue_depth_is_monotonic() {
        let metrics = PoolMetrics::new();
        metrics.set_queue_depth(3);
        metrics.set_queue_depth(7);
        metrics.set_queue_depth(2);
        assert_eq!(metrics.queue_depth(), 2);
        assert_eq!(metrics.peak_queue_depth(), 7);
    }

    #[test]
    fn test_outcomes_and_average() {
        let metrics = PoolMetrics::new();
        metrics.record_finished(TaskStatus::Completed, Duration::from_millis(10));
        metrics.record_finished(TaskStatus::Completed, Duration::from_millis(30));
        metrics.record_finished(TaskStatus::Failed, Duration::from_millis(500));
        metrics.record_finished(TaskStatus::Cancelled, Duration::ZERO);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.completed, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.cancelled, 1);
        assert_eq!(snapshot.avg_run_time, Duration::from_millis(20));
    }
}
