//! `POST /render` (§6): validates shape, derives a job id, and enqueues the
//! request onto the durable render queue. The state machine itself — credit
//! reservation, cache probe, clip fan-out, compose, publish — executes inside
//! the worker process; this handler never blocks on it (§4.8 "Implementation
//! notes (ambient)").

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::info;

use vrender_models::job::RenderJob;
use vrender_models::render_request::RenderRequest;

use crate::auth::{AppAttestation, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::security::is_valid_identifier;
use crate::state::AppState;

#[derive(Serialize)]
pub struct RenderAcceptedResponse {
    pub job_id: String,
    pub status: &'static str,
}

/// Enqueue one render. A request with only `{project_id, published:true}` and
/// no scenes is the publish-only shorthand (§6) and is enqueued the same way;
/// the worker's `Init` rule treats it as a cache-hit-required redrive.
pub async fn render(
    State(state): State<AppState>,
    auth: AuthUser,
    attestation: AppAttestation,
    Json(request): Json<RenderRequest>,
) -> ApiResult<Json<RenderAcceptedResponse>> {
    attestation.require()?;

    if !is_valid_identifier(&request.project_id) {
        return Err(ApiError::bad_request("invalid project_id"));
    }
    if !request.is_publish_only() && request.scenes.is_empty() {
        return Err(ApiError::bad_request("scenes must be non-empty unless published:true with no scenes"));
    }
    if request.audio_ref.is_empty() {
        return Err(ApiError::bad_request("audio_ref is required"));
    }

    let job = RenderJob::new(auth.uid.clone(), request);
    let job_id = job.id.clone();

    state
        .queue
        .enqueue(&job)
        .await
        .map_err(|e| ApiError::internal(format!("failed to enqueue render job: {e}")))?;

    crate::metrics::record_job_enqueued();
    info!(job_id = %job_id, user_id = %auth.uid, "render job enqueued");

    Ok(Json(RenderAcceptedResponse {
        job_id: job_id.to_string(),
        status: "queued",
    }))
}
