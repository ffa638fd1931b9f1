//! Fan-out Scheduler error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("task {index} failed: {reason}")]
    TaskFailed { index: usize, reason: String },

    #[error("task {index} was cancelled")]
    Cancelled { index: usize },
}
