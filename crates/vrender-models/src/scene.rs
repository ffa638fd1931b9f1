//! Scene definitions — the unit of animation inside a render request.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Camera motion applied while a still image is looped to fill a scene's duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Camera {
    Static,
    ZoomIn,
    ZoomOut,
    PanLeft,
    PanRight,
}

impl Default for Camera {
    fn default() -> Self {
        Camera::Static
    }
}

/// Cross-scene transition used by the compositor's concat pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Fade,
    Dissolve,
    Wipeleft,
    Wiperight,
    Circleopen,
    None,
}

impl Default for Transition {
    fn default() -> Self {
        Transition::None
    }
}

/// Per-scene quality hint; only meaningful combined with a premium plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SceneQuality {
    Standard,
    Premium,
}

/// Target aspect ratio for a scene (falls back to the request's target resolution
/// when absent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum AspectRatio {
    #[serde(rename = "9:16")]
    Portrait9x16,
    #[serde(rename = "16:9")]
    Landscape16x9,
    #[serde(rename = "1:1")]
    Square1x1,
}

/// One scene of a render request: a prompt/narration pair with a target duration,
/// camera motion, and transition into the next scene.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// Dense 0..N-1 position within the request's scene list.
    pub index: u32,
    pub prompt: String,
    pub narration: String,
    /// Seconds, clamped to 1..60 during validation.
    pub duration_seconds: u32,
    #[serde(default)]
    pub camera: Camera,
    #[serde(default)]
    pub transition: Transition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<SceneQuality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
}

impl Scene {
    /// Duration the clip generator should request from the external provider:
    /// `min(duration_seconds, 8)`, defaulting to 8 when unset (duration_seconds is
    /// required on the wire, so "unset" only applies to callers constructing one
    /// programmatically with `0`).
    pub fn clip_duration_seconds(&self) -> u32 {
        if self.duration_seconds == 0 {
            8
        } else {
            self.duration_seconds.min(8)
        }
    }

    pub fn wants_premium_model(&self) -> bool {
        matches!(self.quality, Some(SceneQuality::Premium))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(duration: u32) -> Scene {
        Scene {
            index: 0,
            prompt: "a".into(),
            narration: "b".into(),
            duration_seconds: duration,
            camera: Camera::Static,
            transition: Transition::None,
            quality: None,
            aspect_ratio: None,
        }
    }

    #[test]
    fn clip_duration_clamps_to_eight() {
        assert_eq!(scene(12).clip_duration_seconds(), 8);
        assert_eq!(scene(5).clip_duration_seconds(), 5);
    }

    #[test]
    fn clip_duration_defaults_to_eight_when_unset() {
        assert_eq!(scene(0).clip_duration_seconds(), 8);
    }

    #[test]
    fn camera_and_transition_default() {
        assert_eq!(Camera::default(), Camera::Static);
        assert_eq!(Transition::default(), Transition::None);
    }
}
