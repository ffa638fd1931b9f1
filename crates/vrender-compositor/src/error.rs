//! Compositor (C7) error taxonomy: classified as a retryable transcode fault
//! or a fatal filter error (§4.7, §7).

use std::path::PathBuf;
use thiserror::Error;

pub type CompositorResult<T> = Result<T, CompositorError>;

#[derive(Debug, Error)]
pub enum CompositorError {
    #[error("ffmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("ffprobe not found in PATH")]
    FfprobeNotFound,

    #[error("ffmpeg filter graph failed: {message}")]
    FilterFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("ffmpeg transcode failed: {message}")]
    TranscodeFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("concat failed: {0}")]
    ConcatFailed(String),

    #[error("ffprobe failed: {message}")]
    ProbeFailed { message: String, stderr: Option<String> },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] vrender_storage::StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CompositorError {
    pub fn transcode_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::TranscodeFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn filter_failed(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::FilterFailed {
            message: message.into(),
            stderr,
        }
    }

    pub fn probe_failed(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ProbeFailed {
            message: message.into(),
            stderr,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the orchestrator should treat this as a transient transcode
    /// fault worth retrying, as opposed to a fatal filter-graph mistake.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CompositorError::TranscodeFailed { .. } | CompositorError::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcode_failures_are_retryable() {
        let err = CompositorError::transcode_failed("oom", None, Some(1));
        assert!(err.is_retryable());
    }

    #[test]
    fn filter_failures_are_not_retryable() {
        let err = CompositorError::filter_failed("bad filter", None);
        assert!(!err.is_retryable());
    }
}
