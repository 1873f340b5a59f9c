//! Bounded task pool for running work off the calling thread.
//!
//! Callers (bus subscribers, command handlers, the transport) submit closures
//! to a [`TaskPool`] and get a [`TaskHandle`] back for status queries and
//! cancellation. Cancellation is cooperative: queued tasks never start,
//! running tasks observe an interrupt flag through their [`TaskContext`].

mod executor;
mod metrics;
mod task;

pub use executor::{ShutdownReport, TaskPool};
pub use metrics::{MetricsSnapshot, PoolMetrics};
pub use task::{TaskContext, TaskError, TaskHandle, TaskId, TaskStatus};

use thiserror::Error;

/// Errors returned by [`TaskPool`] operations.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("task pool is not initialized")]
    Uninitialized,

    #[error("task queue is full ({queue_capacity} pending tasks)")]
    CapacityExceeded { queue_capacity: usize },

    #[error("task pool needs at least one worker")]
    InvalidCapacity,

    #[error("failed to spawn pool worker")]
    WorkerSpawn(#[source] std::io::Error),
}
