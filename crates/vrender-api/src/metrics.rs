//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "vrender_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vrender_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vrender_http_requests_in_flight";

    pub const QUEUE_LENGTH: &str = "vrender_queue_length";
    pub const JOBS_ENQUEUED_TOTAL: &str = "vrender_jobs_enqueued_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vrender_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vrender_jobs_failed_total";

    pub const FFMPEG_DURATION_SECONDS: &str = "vrender_ffmpeg_duration_seconds";
    pub const CLIPS_PROCESSED_TOTAL: &str = "vrender_clips_processed_total";

    pub const PROGRESS_SUBSCRIBERS_ACTIVE: &str = "vrender_progress_subscribers_active";

    pub const RATE_LIMIT_HITS_TOTAL: &str = "vrender_rate_limit_hits_total";
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn set_queue_length(length: u64) {
    gauge!(names::QUEUE_LENGTH).set(length as f64);
}

pub fn record_job_enqueued() {
    counter!(names::JOBS_ENQUEUED_TOTAL).increment(1);
}

pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

pub fn record_job_failed() {
    counter!(names::JOBS_FAILED_TOTAL).increment(1);
}

pub fn record_clip_processed(cached: bool) {
    let labels = [("cached", cached.to_string())];
    counter!(names::CLIPS_PROCESSED_TOTAL, &labels).increment(1);
}

pub fn set_progress_subscribers(count: i64) {
    gauge!(names::PROGRESS_SUBSCRIBERS_ACTIVE).set(count as f64);
}

pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Sanitize a path for metric labels: collapse `project_id`/`job_id`
/// segments so cardinality doesn't scale with request volume.
fn sanitize_path(path: &str) -> String {
    let path = regex_lite::Regex::new(r"/cache-status/[^/]+")
        .unwrap()
        .replace_all(path, "/cache-status/:project_id");
    let path = regex_lite::Regex::new(r"/signed-clips/[^/]+")
        .unwrap()
        .replace_all(&path, "/signed-clips/:project_id");
    path.to_string()
}

pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();
    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_path_collapses_project_ids() {
        assert_eq!(sanitize_path("/cache-status/proj-123"), "/cache-status/:project_id");
        assert_eq!(sanitize_path("/signed-clips/proj-123"), "/signed-clips/:project_id");
        assert_eq!(sanitize_path("/render"), "/render");
    }
}
