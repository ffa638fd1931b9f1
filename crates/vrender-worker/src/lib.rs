#![deny(unreachable_patterns)]
//! Render Orchestrator (C8): consumes render jobs off the durable queue and
//! drives them through the `Init..Publish` state machine (§4.8), reserving
//! and settling credits (C3), fanning out clip generation (C5/C6), composing
//! the final video (C7), and publishing it through the blob store (C1).

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod orchestrator;
pub mod queue;

pub use config::WorkerConfig;
pub use error::{OrchestratorError, OrchestratorResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use orchestrator::{RenderOrchestrator, RenderOutcome};
pub use queue::{QueuedJob, RenderQueue};
