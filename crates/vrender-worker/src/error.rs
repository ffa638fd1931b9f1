//! Render Orchestrator (C8) error taxonomy (§7): wraps every downstream
//! component's typed error and classifies it as retryable or fatal for the
//! queue's retry/dead-letter decision.

use thiserror::Error;

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid render request: {0}")]
    InvalidRequest(String),

    #[error("insufficient credits: need {required}, have {available}")]
    InsufficientCredits { required: u32, available: u32 },

    #[error("render cancelled")]
    Cancelled,

    #[error(transparent)]
    Storage(#[from] vrender_storage::StorageError),

    #[error(transparent)]
    Ledger(#[from] vrender_ledger::FirestoreError),

    #[error(transparent)]
    ClipGen(#[from] vrender_clipgen::ClipGenError),

    #[error(transparent)]
    Compositor(#[from] vrender_compositor::CompositorError),

    #[error(transparent)]
    Progress(#[from] vrender_progress::ProgressError),

    #[error(transparent)]
    Scheduler(#[from] vrender_scheduler::SchedulerError),

    #[error(transparent)]
    Queue(#[from] redis::RedisError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    /// Whether the caller may re-drive the same `job_id` and expect a
    /// different outcome (§7): provider/transcode/transient-storage faults
    /// are retryable, input/auth/credit errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            OrchestratorError::InvalidRequest(_) => false,
            OrchestratorError::InsufficientCredits { .. } => false,
            OrchestratorError::Cancelled => false,
            OrchestratorError::Storage(e) => e.is_retryable(),
            OrchestratorError::Ledger(e) => e.is_retryable(),
            OrchestratorError::ClipGen(_) => true,
            OrchestratorError::Compositor(e) => e.is_retryable(),
            OrchestratorError::Progress(_) => true,
            OrchestratorError::Scheduler(_) => true,
            OrchestratorError::Queue(_) => true,
            OrchestratorError::Json(_) => false,
            OrchestratorError::Io(_) => true,
        }
    }

    /// Stable error code surfaced by the HTTP layer (§6), mirrored by `vrender-api`.
    pub fn code(&self) -> &'static str {
        match self {
            OrchestratorError::InvalidRequest(_) => "INVALID_ARGUMENT",
            OrchestratorError::InsufficientCredits { .. } => "INSUFFICIENT_CREDITS",
            OrchestratorError::Cancelled => "CANCELLED",
            OrchestratorError::ClipGen(_) => "FAL_CLIP_FAILURE",
            OrchestratorError::Scheduler(_) => "FAL_CLIP_FAILURE",
            OrchestratorError::Compositor(_) => "FFMPEG_FAILURE",
            _ => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credit_and_input_errors_are_not_retryable() {
        assert!(!OrchestratorError::InvalidRequest("bad".into()).is_retryable());
        assert!(!OrchestratorError::InsufficientCredits { required: 3, available: 1 }.is_retryable());
    }

    #[test]
    fn clip_and_queue_errors_are_retryable() {
        let err = OrchestratorError::ClipGen(vrender_clipgen::ClipGenError::NoModelSucceeded { scene_index: 0 });
        assert!(err.is_retryable());
    }

    #[test]
    fn error_codes_match_external_taxonomy() {
        assert_eq!(OrchestratorError::InvalidRequest("x".into()).code(), "INVALID_ARGUMENT");
        assert_eq!(
            OrchestratorError::InsufficientCredits { required: 1, available: 0 }.code(),
            "INSUFFICIENT_CREDITS"
        );
    }
}
