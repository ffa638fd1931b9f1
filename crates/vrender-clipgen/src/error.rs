//! Clip Generator error taxonomy.

use thiserror::Error;

pub type ClipGenResult<T> = Result<T, ClipGenError>;

#[derive(Debug, Error)]
pub enum ClipGenError {
    #[error("provider submit failed for model {model}: {reason}")]
    ProviderSubmit { model: String, reason: String },

    #[error("provider poll timed out for model {model} after {timeout_ms}ms")]
    ProviderTimeout { model: String, timeout_ms: u64 },

    #[error("failed to download clip result from provider: {0}")]
    ProviderDownload(String),

    #[error("no model candidate succeeded for scene {scene_index}")]
    NoModelSucceeded { scene_index: u32 },

    #[error(transparent)]
    Storage(#[from] vrender_storage::StorageError),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ClipGenError {
    /// Whether a submit/poll failure should be treated as this model candidate's
    /// failure (move to the next candidate) rather than as immediately fatal.
    /// Every variant here already means "this candidate is done" — there is no
    /// further retry within the same model, per §4.5's edge policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClipGenError::Network(_))
    }
}
