//! Fan-out Scheduler (C6): bounded-concurrency driver for per-scene work,
//! shared by the Clip Generator (C5) and any other N-parallel step.

pub mod error;
pub mod scheduler;

pub use error::SchedulerError;
pub use scheduler::{
    aggregate_percent, run_fanout, ProgressReporter, SchedulerConfig, DEFAULT_CANCEL_GRACE,
    DEFAULT_CONCURRENCY, MAX_CONCURRENCY,
};
