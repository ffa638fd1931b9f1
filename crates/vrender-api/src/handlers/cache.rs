//! `GET /cache-status/{project_id}` and `GET /signed-clips/{project_id}`
//! (§6): read-only inventory of what's already in the blob store for a
//! project, without needing the original render request to be replayed.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use vrender_storage::keys::{movie_key, scene_clip_key};
use vrender_storage::INTERNAL_URL_TTL;

use crate::error::{ApiError, ApiResult};
use crate::security::is_valid_identifier;
use crate::state::AppState;

/// Upper bound on scene index probed when no render request is on hand to
/// say how many scenes a project has — the largest tier's scene cap (§4.7).
const MAX_SCENES_PROBED: u32 = 10;

#[derive(Serialize)]
pub struct CacheStatusResponse {
    pub project_id: String,
    pub movie_cached: bool,
    pub scenes_cached: Vec<u32>,
}

pub async fn cache_status(State(state): State<AppState>, Path(project_id): Path<String>) -> ApiResult<Json<CacheStatusResponse>> {
    if !is_valid_identifier(&project_id) {
        return Err(ApiError::bad_request("invalid project_id"));
    }

    let movie_cached = state.storage.exists(&movie_key(&project_id)).await?;

    let mut scenes_cached = Vec::new();
    for index in 0..MAX_SCENES_PROBED {
        if state.storage.exists(&scene_clip_key(&project_id, index as usize)).await? {
            scenes_cached.push(index);
        }
    }

    Ok(Json(CacheStatusResponse {
        project_id,
        movie_cached,
        scenes_cached,
    }))
}

#[derive(Serialize)]
pub struct SignedClip {
    pub scene_index: u32,
    pub url: String,
}

#[derive(Serialize)]
pub struct SignedClipsResponse {
    pub project_id: String,
    pub clips: Vec<SignedClip>,
}

pub async fn signed_clips(State(state): State<AppState>, Path(project_id): Path<String>) -> ApiResult<Json<SignedClipsResponse>> {
    if !is_valid_identifier(&project_id) {
        return Err(ApiError::bad_request("invalid project_id"));
    }

    let mut clips = Vec::new();
    for index in 0..MAX_SCENES_PROBED {
        let key = scene_clip_key(&project_id, index as usize);
        if state.storage.exists(&key).await? {
            let url = state.storage.signed_url(&key, INTERNAL_URL_TTL).await?;
            clips.push(SignedClip { scene_index: index, url });
        }
    }

    Ok(Json(SignedClipsResponse { project_id, clips }))
}
