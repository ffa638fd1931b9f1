//! The request body the orchestrator consumes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::plan::UserTier;
use crate::scene::Scene;

/// Target platform preset; selects the compositor's encode profile and default
/// resolution clamp (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportPreset {
    Youtube,
    Tiktok,
    Square,
    Custom,
}

impl ExportPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportPreset::Youtube => "youtube",
            ExportPreset::Tiktok => "tiktok",
            ExportPreset::Square => "square",
            ExportPreset::Custom => "custom",
        }
    }
}

/// A blob-store locator. Opaque from the orchestrator's perspective: just a path
/// under the project's namespace (§6).
pub type BlobPath = String;

/// What the render orchestrator (C8) consumes for one render.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderRequest {
    pub project_id: String,
    pub scenes: Vec<Scene>,
    pub audio_ref: BlobPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitles_ref: Option<BlobPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_ref: Option<BlobPath>,
    pub target_width: u32,
    pub target_height: u32,
    pub export_preset: ExportPreset,
    /// Idempotency key for the whole render; derived (`render-{project}-{ts}`) if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub published: bool,
    pub user_tier: UserTier,
    #[serde(default)]
    pub no_subtitles: bool,
}

impl RenderRequest {
    /// Whether this is the publish-only shorthand: `{project_id, published:true}` with
    /// no scenes supplied (§6). Requires a cache hit to succeed.
    pub fn is_publish_only(&self) -> bool {
        self.scenes.is_empty() && self.published
    }

    pub fn total_duration_seconds(&self) -> u32 {
        self.scenes.iter().map(|s| s.duration_seconds).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Camera, Transition};

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
    fn publish_only_requires_no_scenes_and_published() {
        let req = RenderRequest {
            project_id: "p1".into(),
            scenes: vec![],
            audio_ref: "narration.mp3".into(),
            subtitles_ref: None,
            music_ref: None,
            target_width: 1280,
            target_height: 720,
            export_preset: ExportPreset::Youtube,
            job_id: None,
            force: false,
            published: true,
            user_tier: UserTier::Basic,
            no_subtitles: false,
        };
        assert!(req.is_publish_only());
    }

    #[test]
    fn total_duration_sums_scenes() {
        let req = RenderRequest {
            project_id: "p1".into(),
            scenes: vec![scene(0, 5), scene(1, 7)],
            audio_ref: "narration.mp3".into(),
            subtitles_ref: None,
            music_ref: None,
            target_width: 1280,
            target_height: 720,
            export_preset: ExportPreset::Youtube,
            job_id: None,
            force: false,
            published: false,
            user_tier: UserTier::Free,
            no_subtitles: false,
        };
        assert_eq!(req.total_duration_seconds(), 12);
        assert!(!req.is_publish_only());
    }
}
