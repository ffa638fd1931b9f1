//! Render Orchestrator (C8) state machine (§4.8):
//! `Init -> Reserve -> Validate -> CacheProbe -> Publish` on a cache hit, or
//! `... -> ClipPhase -> ComposePhase -> UploadPhase -> Publish` on a miss,
//! with `Failed` as the sink any state can transition to. Progress is
//! published at every transition; credits are reserved once up front and
//! either settled (success) or released (failure/cancellation).

use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;

use vrender_clipgen::{ClipGenerator, SceneClip};
use vrender_compositor::{ComposeProgressCallback, CompositeOutput, CompositeRequest, Compositor, SceneInput, SceneSource};
use vrender_ledger::{CreditLedger, FirestoreError};
use vrender_models::credit::CreditOperation;
use vrender_models::job::RenderJob;
use vrender_models::manifest::{Manifest, ManifestInputs, ManifestScene};
use vrender_models::plan::{video_render_rate, TierLimits, UserTier};
use vrender_models::progress::{ProgressUpdate, STAGE_CLIPS, STAGE_COMPOSING, STAGE_DONE, STAGE_INITIALIZING, STAGE_UPLOADING};
use vrender_models::render_request::RenderRequest;
use vrender_models::scene::Scene;
use vrender_progress::ProgressBus;
use vrender_scheduler::{run_fanout, SchedulerConfig, SchedulerError};
use vrender_storage::keys::{movie_key, scene_image_key};
use vrender_storage::{BlobStore, DRAFT_URL_TTL};

use crate::error::{OrchestratorError, OrchestratorResult};

const CLIP_PHASE_START: u8 = 10;
const CLIP_PHASE_END: u8 = 75;
const COMPOSE_PHASE_END: u8 = 92;
const NARRATION_PAD_SECONDS: f64 = 2.0;

/// Per-scene result of the clip phase: either a generated/cached clip, or,
/// per §4.5's edge policy, a fallback to the scene's still source image when
/// every model candidate was exhausted. Index-aligned with the `scenes`
/// slice passed to `clip_phase`.
enum SceneOutcome {
    Clip(SceneClip),
    ImageFallback,
}

/// Successful outcome of one render: the URL the caller hands back over
/// `POST /render`, whether it was a cache hit, and a short engine label
/// surfaced in the terminal progress message.
pub struct RenderOutcome {
    pub video_url: String,
    pub cached: bool,
    pub engine: &'static str,
}

pub struct RenderOrchestrator {
    storage: BlobStore,
    progress: ProgressBus,
    ledger: CreditLedger,
    clipgen: Arc<ClipGenerator>,
    compositor: Compositor,
    scheduler_config: SchedulerConfig,
}

impl RenderOrchestrator {
    pub fn new(
        storage: BlobStore,
        progress: ProgressBus,
        ledger: CreditLedger,
        clipgen: ClipGenerator,
        compositor: Compositor,
        scheduler_config: SchedulerConfig,
    ) -> Self {
        Self {
            storage,
            progress,
            ledger,
            clipgen: Arc::new(clipgen),
            compositor,
            scheduler_config,
        }
    }

    /// Drive one render job through the full state machine, publishing
    /// progress throughout and making the credit-settlement decision
    /// described in §4.8's Failed state.
    pub async fn run(&self, job: &RenderJob, cancel: watch::Receiver<bool>) -> OrchestratorResult<RenderOutcome> {
        let job_id = job.id.as_str();
        let request = &job.request;

        self.progress
            .publish(job_id, ProgressUpdate::new().stage(STAGE_INITIALIZING).percent(1))
            .await
            .ok();

        if request.is_publish_only() {
            return self.publish_only(job_id, request).await;
        }

        if request.scenes.is_empty() {
            let err = OrchestratorError::InvalidRequest("render request has no scenes".into());
            self.progress.publish(job_id, ProgressUpdate::new().error(err.to_string())).await.ok();
            return Err(err);
        }

        let credits_needed = video_render_rate(request.user_tier) * request.scenes.len() as u32;
        let reservation = match self
            .ledger
            .reserve(&job.user_id, job_id, CreditOperation::VideoRender, credits_needed)
            .await
        {
            Ok(r) => r,
            Err(FirestoreError::InsufficientCredits { required, available }) => {
                let err = OrchestratorError::InsufficientCredits { required, available };
                self.progress.publish(job_id, ProgressUpdate::new().error(err.to_string())).await.ok();
                return Err(err);
            }
            Err(e) => return Err(e.into()),
        };

        match self.render_reserved(job_id, request, &cancel).await {
            Ok(outcome) => {
                if let Err(e) = self.ledger.settle(&reservation).await {
                    warn!(job_id, error = %e, "failed to settle credit reservation after successful render");
                }
                self.progress
                    .publish(job_id, ProgressUpdate::new().done().message(outcome.engine))
                    .await
                    .ok();
                Ok(outcome)
            }
            Err(e) => {
                let reason = if matches!(e, OrchestratorError::Cancelled) {
                    "canceled".to_string()
                } else {
                    e.to_string()
                };
                if let Err(fail_err) = self.ledger.fail(&reservation, reason).await {
                    warn!(job_id, error = %fail_err, "failed to release credit reservation after failed render");
                }
                self.progress.publish(job_id, ProgressUpdate::new().error(e.to_string())).await.ok();
                Err(e)
            }
        }
    }

    /// The `{project_id, published: true}` shorthand (§6): succeeds only if a
    /// render for this project already sits at the well-known output key.
    async fn publish_only(&self, job_id: &str, request: &RenderRequest) -> OrchestratorResult<RenderOutcome> {
        let final_key = movie_key(&request.project_id);
        if !self.storage.exists(&final_key).await? {
            let err = OrchestratorError::InvalidRequest("publish-only request requires an existing cached render".into());
            self.progress.publish(job_id, ProgressUpdate::new().error(err.to_string())).await.ok();
            return Err(err);
        }
        let video_url = self.storage.publish(&final_key).await?;
        self.progress.publish(job_id, ProgressUpdate::new().done().message("published")).await.ok();
        Ok(RenderOutcome { video_url, cached: true, engine: "cache" })
    }

    /// Validate -> CacheProbe -> (ClipPhase -> ComposePhase -> UploadPhase).
    /// Runs with the credit reservation already held; never touches the
    /// ledger itself.
    async fn render_reserved(
        &self,
        job_id: &str,
        request: &RenderRequest,
        cancel: &watch::Receiver<bool>,
    ) -> OrchestratorResult<RenderOutcome> {
        let limits = request.user_tier.limits();
        let scenes = self.validate_and_sync(job_id, request, limits).await?;

        let (manifest, cache_hit) = self.cache_probe(request, &scenes).await?;
        if let Some(cache_path) = cache_hit {
            let final_key = movie_key(&request.project_id);
            self.storage.copy(&cache_path, &final_key).await?;
            let video_url = self.final_url(request, &final_key).await?;
            self.progress
                .publish(job_id, ProgressUpdate::new().stage(STAGE_DONE).percent(100).message("cached"))
                .await
                .ok();
            return Ok(RenderOutcome { video_url, cached: true, engine: "cache" });
        }

        let outcomes = self.clip_phase(job_id, request, &scenes, cancel.clone()).await?;
        let composed = self.compose_phase(job_id, request, &scenes, &outcomes).await?;

        self.progress
            .publish(job_id, ProgressUpdate::new().stage(STAGE_UPLOADING).percent(COMPOSE_PHASE_END))
            .await
            .ok();

        let final_key = movie_key(&request.project_id);
        if let Err(e) = self.storage.copy(&final_key, &manifest.final_cache_path()).await {
            warn!(job_id, error = %e, "failed to write render to cache; serving the upload anyway");
        }

        Ok(RenderOutcome { video_url: composed.video_url, cached: false, engine: "render" })
    }

    /// Enforce §4.7/§4.8 tier limits and synchronize scene durations to the
    /// narration track's actual length. Emits a `warning` progress field if
    /// the narration overruns the tier's total-duration cap (§8 boundary
    /// behavior: truncated proportionally, not rejected).
    async fn validate_and_sync(&self, job_id: &str, request: &RenderRequest, limits: TierLimits) -> OrchestratorResult<Vec<Scene>> {
        if request.scenes.len() > limits.max_scenes {
            return Err(OrchestratorError::InvalidRequest(format!(
                "{} scenes exceeds the {} tier's limit of {}",
                request.scenes.len(),
                request.user_tier.as_str(),
                limits.max_scenes
            )));
        }

        let scratch = tempfile::tempdir()?;
        let audio_path = scratch.path().join("narration-probe.mp3");
        self.storage.download_file(&request.audio_ref, &audio_path).await?;
        let narration_seconds = vrender_compositor::probe_video(&audio_path)
            .await
            .map(|info| info.duration)
            .unwrap_or(0.0);

        let mut target_total = (narration_seconds + NARRATION_PAD_SECONDS).round() as u32;
        let mut warning = None;
        if target_total > limits.max_total_seconds {
            warning = Some(format!(
                "narration duration {:.1}s exceeds the {} tier's {}s total cap; scenes truncated proportionally",
                narration_seconds,
                request.user_tier.as_str(),
                limits.max_total_seconds
            ));
            target_total = limits.max_total_seconds;
        }

        if let Some(warning) = warning {
            let update = ProgressUpdate { warning: Some(warning), ..ProgressUpdate::new() };
            self.progress.publish(job_id, update).await.ok();
        }

        Ok(sync_scene_durations(&request.scenes, target_total, limits.max_scene_seconds))
    }

    /// Compute the cache-key manifest (C4) and probe the blob store for an
    /// existing render at that key (§4.4).
    async fn cache_probe(&self, request: &RenderRequest, scenes: &[Scene]) -> OrchestratorResult<(Manifest, Option<String>)> {
        let audio_digest = self.storage.digest(&request.audio_ref).await?;
        let music_digest = match &request.music_ref {
            Some(key) => Some(self.storage.digest(key).await?),
            None => None,
        };
        let subtitles_digest = if request.no_subtitles {
            None
        } else {
            match &request.subtitles_ref {
                Some(key) => Some(self.storage.digest(key).await?),
                None => None,
            }
        };

        let mut img = Vec::with_capacity(scenes.len());
        for scene in scenes {
            img.push(self.storage.digest(&scene_image_key(&request.project_id, scene.index as usize, "final")).await?);
        }

        let manifest = Manifest {
            engine: "render-orchestrator".to_string(),
            plan_tier: request.user_tier,
            width: request.target_width,
            height: request.target_height,
            export_preset: request.export_preset,
            scenes: scenes
                .iter()
                .map(|s| ManifestScene { duration: s.duration_seconds, camera: s.camera, transition: s.transition })
                .collect(),
            inputs: ManifestInputs { img, audio: Some(audio_digest), music: music_digest, subtitles: subtitles_digest },
        };

        if !request.force && self.storage.exists(&manifest.final_cache_path()).await? {
            let path = manifest.final_cache_path();
            return Ok((manifest, Some(path)));
        }
        Ok((manifest, None))
    }

    /// Fan out C5 clip generation across scenes bounded by C6, reporting the
    /// `[10, 75]` progress window (§4.8). A scene whose clip-generation
    /// candidates are exhausted does not abort the render (§4.5, §4.6): it
    /// falls back to image synthesis in `compose_phase`, unless the scene's
    /// source image is itself missing, which is genuinely fatal.
    async fn clip_phase(
        &self,
        job_id: &str,
        request: &RenderRequest,
        scenes: &[Scene],
        cancel: watch::Receiver<bool>,
    ) -> OrchestratorResult<Vec<SceneOutcome>> {
        let mut start = ProgressUpdate::new().stage(STAGE_CLIPS).percent(CLIP_PHASE_START);
        start.scene_count = Some(scenes.len() as u32);
        self.progress.publish(job_id, start).await.ok();

        let clipgen = Arc::clone(&self.clipgen);
        let project_id = request.project_id.clone();
        let tier = request.user_tier;
        let force = request.force;
        let scenes_owned: Vec<Scene> = scenes.to_vec();
        let task_count = scenes_owned.len();

        let progress = self.progress.clone();
        let job_id_owned = job_id.to_string();

        let results = run_fanout(
            task_count,
            self.scheduler_config,
            cancel,
            move |index, reporter| {
                let clipgen = Arc::clone(&clipgen);
                let project_id = project_id.clone();
                let scene = scenes_owned[index].clone();
                async move {
                    let image_path = scene_image_key(&project_id, scene.index as usize, "final");
                    let result = clipgen.generate_scene_clip(&project_id, tier, &scene, &image_path, force, None).await;
                    if result.is_ok() {
                        reporter.report(100);
                    }
                    result
                }
            },
            move |per_scene, percent| {
                let mut update = ProgressUpdate::new().stage(STAGE_CLIPS).percent(percent);
                update.per_scene = Some(per_scene.iter().map(|(&k, &v)| (k as u32, v)).collect());
                let progress = progress.clone();
                let job_id = job_id_owned.clone();
                tokio::spawn(async move {
                    progress.publish(&job_id, update).await.ok();
                });
            },
        )
        .await;

        let mut outcomes = Vec::with_capacity(task_count);
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(clip) => outcomes.push(SceneOutcome::Clip(clip)),
                Err(SchedulerError::Cancelled { .. }) => return Err(OrchestratorError::Cancelled),
                Err(SchedulerError::TaskFailed { reason, .. }) => {
                    let scene = &scenes[index];
                    let image_path = scene_image_key(&request.project_id, scene.index as usize, "final");
                    if !self.storage.exists(&image_path).await? {
                        return Err(OrchestratorError::InvalidRequest(format!(
                            "scene {} clip generation failed ({reason}) and no source image is available for fallback",
                            scene.index
                        )));
                    }
                    warn!(job_id, scene_index = scene.index, reason, "clip generation exhausted, falling back to image synthesis");
                    outcomes.push(SceneOutcome::ImageFallback);
                }
            }
        }
        Ok(outcomes)
    }

    /// Run C7 over the generated clips, reporting the `[75, 92]` progress
    /// window (§4.8).
    async fn compose_phase(
        &self,
        job_id: &str,
        request: &RenderRequest,
        scenes: &[Scene],
        outcomes: &[SceneOutcome],
    ) -> OrchestratorResult<CompositeOutput> {
        self.progress
            .publish(job_id, ProgressUpdate::new().stage(STAGE_COMPOSING).percent(CLIP_PHASE_END))
            .await
            .ok();

        let scratch = tempfile::tempdir()?;

        let narration_path = scratch.path().join("narration.mp3");
        self.storage.download_file(&request.audio_ref, &narration_path).await?;

        let music_path = match &request.music_ref {
            Some(key) => {
                let path = scratch.path().join("music.mp3");
                self.storage.download_file(key, &path).await?;
                Some(path)
            }
            None => None,
        };

        let subtitles_srt = if request.no_subtitles {
            None
        } else if let Some(key) = &request.subtitles_ref {
            let bytes = self.storage.download_bytes(key).await?;
            Some(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            None
        };

        let mut scene_inputs = Vec::with_capacity(scenes.len());
        for (scene, outcome) in scenes.iter().zip(outcomes.iter()) {
            let source = match outcome {
                SceneOutcome::Clip(clip) => {
                    let local = scratch.path().join(format!("clip-{}.mp4", scene.index));
                    self.storage.download_file(&clip.clip_path, &local).await?;
                    SceneSource::Clip(local)
                }
                SceneOutcome::ImageFallback => {
                    let image_path = scene_image_key(&request.project_id, scene.index as usize, "final");
                    let local = scratch.path().join(format!("scene-{}.jpg", scene.index));
                    self.storage.download_file(&image_path, &local).await?;
                    SceneSource::Image(local)
                }
            };
            scene_inputs.push(SceneInput {
                index: scene.index,
                duration_seconds: scene.duration_seconds,
                camera: scene.camera,
                source,
            });
        }

        let req = CompositeRequest {
            project_id: request.project_id.clone(),
            scenes: scene_inputs,
            narration_path,
            music_path,
            subtitles_srt,
            no_subtitles: request.no_subtitles,
            target_width: request.target_width,
            target_height: request.target_height,
            resolution_ceiling: request.user_tier.resolution_limit(),
            export_preset: request.export_preset,
            watermark: request.user_tier == UserTier::Free,
            published: request.published,
        };

        let progress = self.progress.clone();
        let job_id_owned = job_id.to_string();
        let on_progress: ComposeProgressCallback = Arc::new(move |percent| {
            let progress = progress.clone();
            let job_id = job_id_owned.clone();
            tokio::spawn(async move {
                progress.publish(&job_id, ProgressUpdate::new().stage(STAGE_COMPOSING).percent(percent)).await.ok();
            });
        });

        Ok(self.compositor.compose(&req, Some(on_progress)).await?)
    }

    async fn final_url(&self, request: &RenderRequest, key: &str) -> OrchestratorResult<String> {
        if request.published {
            Ok(self.storage.publish(key).await?)
        } else {
            Ok(self.storage.signed_url(key, DRAFT_URL_TTL).await?)
        }
    }
}

/// Distribute `target_total` seconds across `scenes` weighted by their
/// existing durations, clamping each to `max_scene_seconds` and letting the
/// last scene absorb the rounding remainder (§4.8 Validate rule).
fn sync_scene_durations(scenes: &[Scene], target_total: u32, max_scene_seconds: u32) -> Vec<Scene> {
    let mut synced: Vec<Scene> = scenes.to_vec();
    if synced.is_empty() || target_total == 0 {
        return synced;
    }

    let weights: Vec<u32> = synced.iter().map(|s| s.duration_seconds.max(1)).collect();
    let total_weight: u32 = weights.iter().sum();
    let last_index = synced.len() - 1;

    let mut assigned_total = 0u32;
    for (i, scene) in synced.iter_mut().enumerate() {
        if i == last_index {
            continue;
        }
        let share = ((target_total as u64 * weights[i] as u64) / total_weight as u64) as u32;
        let clamped = share.clamp(1, max_scene_seconds);
        scene.duration_seconds = clamped;
        assigned_total += clamped;
    }

    let remainder = target_total.saturating_sub(assigned_total).max(1);
    synced[last_index].duration_seconds = remainder.min(max_scene_seconds);

    synced
}

#[cfg(test)]
mod tests {
    use super::*;
    use vrender_models::scene::{Camera, Transition};

    fn scene(i: u32, dur: u32) -> Scene {
        Scene {
            index: i,
            prompt: "p".into(),
            narration: "n".into(),
            duration_seconds: dur,
            camera: Camera::Static,
            transition: Transition::None,
            quality: None,
            aspect_ratio: None,
        }
    }

    #[test]
    fn sync_distributes_proportionally_and_clamps() {
        let scenes = vec![scene(0, 5), scene(1, 5), scene(2, 10)];
        let synced = sync_scene_durations(&scenes, 20, 15);
        let total: u32 = synced.iter().map(|s| s.duration_seconds).sum();
        assert_eq!(total, 20);
        assert!(synced.iter().all(|s| s.duration_seconds <= 15));
    }

    #[test]
    fn sync_is_noop_for_empty_scenes() {
        assert!(sync_scene_durations(&[], 20, 15).is_empty());
    }

}
