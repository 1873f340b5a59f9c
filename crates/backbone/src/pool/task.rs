//! Task identities, handles and per-task state.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Unique identifier of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Lifecycle of a task.
///
/// ```text
/// Queued ──► Running ──► Completed | Cancelled | Failed
///    └──────────────────► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl TaskStatus {
    /// Returns true once the task can no longer change state.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// Error a task body can return.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task observed its interrupt flag and stopped early.
    #[error("task interrupted")]
    Interrupted,

    #[error("{0}")]
    Failed(String),
}

/// What a cancellation request did to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CancelOutcome {
    /// The task had not started and never will.
    Dequeued,
    /// The task is running and its interrupt flag is now raised.
    Interrupted,
    /// The task had already finished.
    TooLate,
}

/// Shared per-task state, owned jointly by the handle, the queue and the
/// in-flight registry.
pub(crate) struct TaskEntry {
    id: TaskId,
    status: Mutex<TaskStatus>,
    changed: Condvar,
    interrupted: AtomicBool,
}

impl TaskEntry {
    pub(crate) fn new() -> Self {
        Self {
            id: TaskId::next(),
            status: Mutex::new(TaskStatus::Queued),
            changed: Condvar::new(),
            interrupted: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn status(&self) -> TaskStatus {
        *self.lock()
    }

    pub(crate) fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    /// Moves `Queued → Running`. Returns false if the task was cancelled
    /// before a worker reached it.
    pub(crate) fn try_start(&self) -> bool {
        let mut status = self.lock();
        if *status == TaskStatus::Queued {
            *status = TaskStatus::Running;
            true
        } else {
            false
        }
    }

    pub(crate) fn cancel(&self) -> CancelOutcome {
        let mut status = self.lock();
        match *status {
            TaskStatus::Queued => {
                *status = TaskStatus::Cancelled;
                self.changed.notify_all();
                CancelOutcome::Dequeued
            }
            TaskStatus::Running => {
                self.interrupted.store(true, Ordering::Release);
                CancelOutcome::Interrupted
            }
            _ => CancelOutcome::TooLate,
        }
    }

    pub(crate) fn finish(&self, outcome: TaskStatus) {
        debug_assert!(outcome.is_terminal());
        let mut status = self.lock();
        *status = outcome;
        self.changed.notify_all();
    }

    fn wait(&self, timeout: Duration) -> Option<TaskStatus> {
        let deadline = Instant::now() + timeout;
        let mut status = self.lock();
        while !status.is_terminal() {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            status = match self.changed.wait_timeout(status, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        Some(*status)
    }

    // Status updates are single assignments, so a poisoned lock still holds a
    // valid status.
    fn lock(&self) -> MutexGuard<'_, TaskStatus> {
        self.status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle returned by [`TaskPool::submit`](super::TaskPool::submit).
///
/// Cloning the handle is cheap; all clones observe the same task.
#[derive(Clone)]
pub struct TaskHandle {
    pub(crate) entry: Arc<TaskEntry>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.entry.id()
    }

    pub fn status(&self) -> TaskStatus {
        self.entry.status()
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    /// Blocks until the task reaches a terminal state or `timeout` elapses.
    ///
    /// Returns the terminal status, or `None` on timeout.
    pub fn wait(&self, timeout: Duration) -> Option<TaskStatus> {
        self.entry.wait(timeout)
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id())
            .field("status", &self.status())
            .finish()
    }
}

/// Passed to a running task body.
///
/// Long-running tasks should poll [`is_interrupted`](Self::is_interrupted) or
/// call [`checkpoint`](Self::checkpoint) regularly; the pool never stops a
/// task any other way.
pub struct TaskContext {
    pub(crate) entry: Arc<TaskEntry>,
}

impl TaskContext {
    pub fn id(&self) -> TaskId {
        self.entry.id()
    }

    pub fn is_interrupted(&self) -> bool {
        self.entry.is_interrupted()
    }

    /// Returns `Err(TaskError::Interrupted)` once cancellation was requested.
    pub fn checkpoint(&self) -> Result<(), TaskError> {
        if self.is_interrupted() {
            Err(TaskError::Interrupted)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_queued_prevents_start() {
        let entry = TaskEntry::new();
        assert_eq!(entry.cancel(), CancelOutcome::Dequeued);
        assert!(!entry.try_start());
        assert_eq!(entry.status(), TaskStatus::Cancelled);
    }

    #[test]
    fn test_cancel_running_raises_interrupt() {
        let entry = TaskEntry::new();
        assert!(entry.try_start());
        assert_eq!(entry.cancel(), CancelOutcome::Interrupted);
        assert!(entry.is_interrupted());
        assert_eq!(entry.status(), TaskStatus::Running);

        entry.finish(TaskStatus::Cancelled);
        assert_eq!(entry.cancel(), CancelOutcome::TooLate);
    }

    #[test]
    fn test_wait_times_out_on_pending_task() {
        let handle = TaskHandle {
            entry: Arc::new(TaskEntry::new()),
        };
        assert_eq!(handle.wait(Duration::from_millis(10)), None);

        handle.entry.finish(TaskStatus::Completed);
        assert_eq!(
            handle.wait(Duration::from_millis(10)),
            Some(TaskStatus::Completed)
        );
    }

    #[test]
    fn test_checkpoint() {
        let ctx = TaskContext {
            entry: Arc::new(TaskEntry::new()),
        };
        assert_eq!(ctx.checkpoint(), Ok(()));
        ctx.entry.try_start();
        ctx.entry.cancel();
        assert_eq!(ctx.checkpoint(), Err(TaskError::Interrupted));
    }
}
