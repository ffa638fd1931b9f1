//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::cache::{cache_status, signed_clips};
use crate::handlers::clip::generate_clip;
use crate::handlers::health::{health, ready};
use crate::handlers::progress::progress_stream;
use crate::handlers::render::render;
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, rate_limit_middleware, request_id, request_logging, security_headers, RateLimiterCache};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let read_rate_limiter = std::sync::Arc::new(RateLimiterCache::new(state.config.rate_limit_rps, state.config.rate_limit_burst));
    let compute_rate_limiter = std::sync::Arc::new(RateLimiterCache::new(state.config.compute_rate_limit_rps, state.config.rate_limit_burst));

    let compute_routes = Router::new()
        .route("/render", post(render))
        .route("/generate-clip", post(generate_clip))
        .layer(middleware::from_fn_with_state(compute_rate_limiter, rate_limit_middleware));

    let read_routes = Router::new()
        .route("/progress-stream", get(progress_stream))
        .route("/cache-status/:project_id", get(cache_status))
        .route("/signed-clips/:project_id", get(signed_clips))
        .layer(middleware::from_fn_with_state(read_rate_limiter, rate_limit_middleware));

    let api_routes = compute_routes.merge(read_routes);

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
