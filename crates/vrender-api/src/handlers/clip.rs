//! `POST /generate-clip` (§6): generates (or reuses) a single scene's clip
//! synchronously, outside the render-job state machine — a standalone draft
//! tool rather than a step of a full render.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use vrender_models::credit::CreditOperation;
use vrender_models::plan::UserTier;
use vrender_models::scene::{Camera, Scene, Transition};
use vrender_storage::keys::scene_image_key;

use crate::auth::{AppAttestation, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::security::{is_valid_identifier, sanitize_string};
use crate::state::AppState;

const CLIP_REGENERATE_RATE: u32 = 1;

#[derive(Debug, Deserialize)]
pub struct GenerateClipRequest {
    pub project_id: String,
    pub scene_index: u32,
    #[serde(default)]
    pub video_seconds: Option<u32>,
    #[serde(default)]
    pub model_override: Option<String>,
    /// Not part of the representative §6 body, but required since this
    /// subsystem has no separate scene-metadata store to read the prompt
    /// back from — the caller (which already holds the project's scene list)
    /// supplies it inline.
    pub prompt: String,
    #[serde(default)]
    pub user_tier: Option<UserTier>,
}

#[derive(Serialize)]
pub struct GenerateClipResponse {
    pub clip_path: String,
    pub clip_url: String,
    pub model: Option<String>,
    pub cached: bool,
}

pub async fn generate_clip(
    State(state): State<AppState>,
    auth: AuthUser,
    attestation: AppAttestation,
    Json(req): Json<GenerateClipRequest>,
) -> ApiResult<Json<GenerateClipResponse>> {
    attestation.require()?;

    if !is_valid_identifier(&req.project_id) {
        return Err(ApiError::bad_request("invalid project_id"));
    }
    if req.prompt.trim().is_empty() {
        return Err(ApiError::bad_request("prompt is required"));
    }
    if let Some(model) = req.model_override.as_deref() {
        if !state.clipgen.config().is_known_model(model) {
            return Err(ApiError::bad_request(format!("unknown model_override: {model}")));
        }
    }

    let tier = req.user_tier.unwrap_or(UserTier::Free);
    let scene = Scene {
        index: req.scene_index,
        prompt: sanitize_string(&req.prompt),
        narration: String::new(),
        duration_seconds: req.video_seconds.unwrap_or(5).clamp(1, 60),
        camera: Camera::Static,
        transition: Transition::None,
        quality: None,
        aspect_ratio: None,
    };
    let image_path = scene_image_key(&req.project_id, req.scene_index as usize, "final");

    // One-off clip draft, charged like any other clip generation; the job id
    // here is synthetic since there's no enclosing render job to key off of.
    let synthetic_job_id = format!("clip-{}-{}", req.project_id, req.scene_index);
    let reservation = state
        .ledger
        .reserve(&auth.uid, &synthetic_job_id, CreditOperation::ClipRegenerate, CLIP_REGENERATE_RATE)
        .await
        .map_err(|e| match e {
            vrender_ledger::FirestoreError::InsufficientCredits { required, available } => {
                ApiError::InsufficientCredits { required, available }
            }
            other => ApiError::Ledger(other),
        })?;

    let result = state
        .clipgen
        .generate_scene_clip(&req.project_id, tier, &scene, &image_path, false, req.model_override.as_deref())
        .await;

    match result {
        Ok(clip) => {
            state.ledger.settle(&reservation).await.ok();
            crate::metrics::record_clip_processed(clip.cached);
            info!(project_id = %req.project_id, scene_index = req.scene_index, cached = clip.cached, "clip generated");
            Ok(Json(GenerateClipResponse {
                clip_path: clip.clip_path,
                clip_url: clip.signed_url,
                model: clip.model,
                cached: clip.cached,
            }))
        }
        Err(e) => {
            state.ledger.fail(&reservation, e.to_string()).await.ok();
            Err(ApiError::ClipGen(e))
        }
    }
}
