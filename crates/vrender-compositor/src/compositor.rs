//! Top-level Compositor (C7): assembles per-scene passes, subtitle burn-in,
//! audio sync, concat and final encode into one MP4, then hands it to C1.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use vrender_models::render_request::ExportPreset;
use vrender_models::scene::Camera;
use vrender_storage::{BlobStore, DRAFT_URL_TTL};

use crate::audio::mux_with_audio;
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::concat::concat_scenes;
use crate::encode::{clamp_resolution, encode_profile};
use crate::error::CompositorResult;
use crate::scene_pass::{render_scene_pass, SceneSource};
use crate::subtitles::{burn_subtitles, extract_scene_subtitles, has_entries, parse_srt, SrtEntry};
use crate::watermark::{with_watermark, WatermarkStyle};

/// One scene's composition inputs, already resolved to local files (or
/// absent, in which case the compositor falls back per §4.7).
pub struct SceneInput {
    pub index: u32,
    pub duration_seconds: u32,
    pub camera: Camera,
    pub source: SceneSource,
}

pub struct CompositeRequest {
    pub project_id: String,
    pub scenes: Vec<SceneInput>,
    pub narration_path: PathBuf,
    pub music_path: Option<PathBuf>,
    pub subtitles_srt: Option<String>,
    pub no_subtitles: bool,
    pub target_width: u32,
    pub target_height: u32,
    pub resolution_ceiling: (u32, u32),
    pub export_preset: ExportPreset,
    pub watermark: bool,
    pub published: bool,
}

pub struct CompositeOutput {
    pub video_url: String,
    pub published: bool,
    pub total_duration_seconds: f64,
}

/// Caller hook for granular progress during the final encode pass, the
/// longest single step of `compose`. Receives a percent already rescaled
/// into whatever stage window the caller is reporting against.
pub type ComposeProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

const FINAL_ENCODE_WINDOW_START: u8 = 80;
const FINAL_ENCODE_WINDOW_END: u8 = 92;

#[derive(Clone)]
pub struct Compositor {
    storage: BlobStore,
}

impl Compositor {
    pub fn new(storage: BlobStore) -> Self {
        Self { storage }
    }

    pub async fn compose(&self, req: &CompositeRequest, on_progress: Option<ComposeProgressCallback>) -> CompositorResult<CompositeOutput> {
        let scratch = tempfile::tempdir()?;
        let profile = encode_profile(req.export_preset);
        let (width, height) = clamp_resolution(req.target_width, req.target_height, req.resolution_ceiling);

        let subtitle_entries = if req.no_subtitles {
            None
        } else {
            req.subtitles_srt.as_deref().map(parse_srt)
        };

        let mut scene_finals = Vec::with_capacity(req.scenes.len());
        let mut offset_ms: i64 = 0;

        for scene in &req.scenes {
            let duration = scene.duration_seconds.max(1) as f64;
            let duration_ms = (duration * 1000.0) as i64;

            let pass_path = render_scene_pass(
                scratch.path(),
                scene.index,
                scene.source.clone(),
                duration,
                scene.camera,
                width,
                height,
                profile,
            )
            .await?;

            let final_path = match &subtitle_entries {
                Some(entries) => {
                    self.burn_scene_subtitles(scratch.path(), scene.index, &pass_path, entries, offset_ms, duration_ms)
                        .await?
                }
                None => pass_path,
            };

            scene_finals.push(final_path);
            offset_ms += duration_ms;
        }

        let total_duration = req.scenes.iter().map(|s| s.duration_seconds as f64).sum::<f64>().max(1.0);

        let composed_silent = scratch.path().join("composed-silent.mp4");
        concat_scenes(&scene_finals, &composed_silent, profile, width, height).await?;

        let composed_audio = scratch.path().join("composed-audio.mp4");
        mux_with_audio(
            &composed_silent,
            &req.narration_path,
            req.music_path.as_deref(),
            total_duration,
            &composed_audio,
            "aac",
            "128k",
        )
        .await?;

        let movie_path = scratch.path().join("movie.mp4");
        let total_duration_ms = (total_duration * 1000.0) as i64;
        self.final_encode(&composed_audio, &movie_path, profile, req.watermark, total_duration_ms, on_progress)
            .await?;

        let video_url = self.upload(&req.project_id, &movie_path, req.published).await?;

        info!(project_id = %req.project_id, total_duration, "composition complete");

        Ok(CompositeOutput {
            video_url,
            published: req.published,
            total_duration_seconds: total_duration,
        })
    }

    /// Burn this scene's local subtitle window. On filter failure, fall back
    /// to the un-subtitled scene pass rather than failing the whole render
    /// (§7).
    async fn burn_scene_subtitles(
        &self,
        scratch: &Path,
        index: u32,
        pass_path: &Path,
        entries: &[SrtEntry],
        offset_ms: i64,
        duration_ms: i64,
    ) -> CompositorResult<PathBuf> {
        let scene_entries = extract_scene_subtitles(entries, offset_ms, duration_ms);
        if has_entries(&scene_entries).is_err() {
            return Ok(pass_path.to_path_buf());
        }

        let srt_path = scratch.join(format!("scene-{index}.srt"));
        tokio::fs::write(&srt_path, crate::subtitles::write_srt(&scene_entries)).await?;

        let output = scratch.join(format!("scene-sub-{index}.mp4"));
        let cmd = burn_subtitles(pass_path, &output, &srt_path, None).await?;

        match FfmpegRunner::new().run(&cmd).await {
            Ok(()) => Ok(output),
            Err(e) => {
                warn!(scene = index, error = %e, "subtitle burn failed, retrying scene without subtitles");
                Ok(pass_path.to_path_buf())
            }
        }
    }

    async fn final_encode(
        &self,
        input: &Path,
        output: &Path,
        profile: crate::encode::EncodeProfile,
        watermark: bool,
        total_duration_ms: i64,
        on_progress: Option<ComposeProgressCallback>,
    ) -> CompositorResult<()> {
        let mut cmd = FfmpegCommand::new(input, output)
            .video_codec("libx264")
            .preset(profile.preset)
            .crf(profile.crf)
            .output_arg("-profile:v")
            .output_arg(profile.profile)
            .output_arg("-level")
            .output_arg(profile.level)
            .output_arg("-b:v")
            .output_arg(profile.bitrate)
            .audio_codec("copy");

        if watermark {
            cmd = with_watermark(cmd, None, &WatermarkStyle::default());
        }

        const FINAL_ENCODE_TIMEOUT_SECS: u64 = 20 * 60;
        let runner = FfmpegRunner::new().with_timeout(FINAL_ENCODE_TIMEOUT_SECS);
        match on_progress {
            Some(cb) => {
                runner
                    .run_with_progress(&cmd, move |progress| {
                        cb(progress.to_window_percent(total_duration_ms, FINAL_ENCODE_WINDOW_START, FINAL_ENCODE_WINDOW_END));
                    })
                    .await
            }
            None => runner.run(&cmd).await,
        }
    }

    async fn upload(&self, project_id: &str, local_path: &Path, published: bool) -> CompositorResult<String> {
        let key = format!("{project_id}/movie.mp4");
        self.storage.upload_file(local_path, &key, "video/mp4").await?;

        if published {
            Ok(self.storage.publish(&key).await?)
        } else {
            Ok(self.storage.signed_url(&key, DRAFT_URL_TTL).await?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_source_clones_preserve_variant() {
        let src = SceneSource::Clip(PathBuf::from("a.mp4"));
        assert!(matches!(src.clone(), SceneSource::Clip(_)));
        assert!(matches!(SceneSource::None.clone(), SceneSource::None));
    }
}
