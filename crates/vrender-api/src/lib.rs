//! Axum HTTP API for the render-orchestration subsystem.
//!
//! This crate provides:
//! - `POST /render` / `POST /generate-clip` enqueue and draft-clip endpoints
//! - `GET /progress-stream` server-sent progress (C2)
//! - `GET /cache-status`, `GET /signed-clips` cache inventory endpoints
//! - Firebase ID token verification and app-attestation checks
//! - Rate limiting, security headers, and Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
