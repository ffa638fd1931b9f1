//! API error types and the stable `code` values named in §7.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("app attestation invalid: {0}")]
    AppCheckInvalid(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited")]
    RateLimited,

    #[error("insufficient credits: need {required}, have {available}")]
    InsufficientCredits { required: u32, available: u32 },

    #[error("clip generation failed: {0}")]
    ClipGen(#[from] vrender_clipgen::ClipGenError),

    #[error("storage error: {0}")]
    Storage(#[from] vrender_storage::StorageError),

    #[error("ledger error: {0}")]
    Ledger(#[from] vrender_ledger::FirestoreError),

    #[error("progress bus error: {0}")]
    Progress(#[from] vrender_progress::ProgressError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn unauthorized_code(msg: impl Into<String>, code: &'static str) -> Self {
        if code == "APP_CHECK_INVALID" {
            Self::AppCheckInvalid(msg.into())
        } else {
            Self::Unauthorized(msg.into())
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) | ApiError::AppCheckInvalid(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) | ApiError::InsufficientCredits { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Ledger(vrender_ledger::FirestoreError::InsufficientCredits { .. }) => StatusCode::BAD_REQUEST,
            ApiError::ClipGen(_) | ApiError::Storage(_) | ApiError::Ledger(_) | ApiError::Progress(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable error code surfaced to callers (§7), used for programmatic
    /// dispatch (retry vs. not) rather than human display.
    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "AUTH_REQUIRED",
            ApiError::AppCheckInvalid(_) => "APP_CHECK_INVALID",
            ApiError::BadRequest(_) => "INVALID_ARGUMENT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::RateLimited => "RATE_LIMITED",
            ApiError::InsufficientCredits { .. } => "INSUFFICIENT_CREDITS",
            ApiError::Ledger(vrender_ledger::FirestoreError::InsufficientCredits { .. }) => "INSUFFICIENT_CREDITS",
            ApiError::ClipGen(_) => "FAL_CLIP_FAILURE",
            ApiError::Storage(_) | ApiError::Ledger(_) | ApiError::Progress(_) | ApiError::Internal(_) => "INTERNAL",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    required: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    available: Option<u32>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code().to_string();

        let (required, available) = match &self {
            ApiError::InsufficientCredits { required, available } => (Some(*required), Some(*available)),
            ApiError::Ledger(vrender_ledger::FirestoreError::InsufficientCredits { required, available }) => {
                (Some(*required), Some(*available))
            }
            _ => (None, None),
        };

        let detail = match &self {
            ApiError::ClipGen(_) | ApiError::Storage(_) | ApiError::Ledger(_) | ApiError::Progress(_) | ApiError::Internal(_) => {
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                    "an internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            detail,
            code,
            required,
            available,
        };

        (status, Json(body)).into_response()
    }
}
