//! Plan tier limits: scene/duration caps and resolution ceilings per §4.7/§4.8.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The billing tier a render request runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserTier {
    Free,
    Basic,
    Premium,
}

impl UserTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserTier::Free => "free",
            UserTier::Basic => "basic",
            UserTier::Premium => "premium",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "free" => Some(UserTier::Free),
            "basic" => Some(UserTier::Basic),
            // "pro" and "studio" are deployment-level aliases of "premium" distinguished
            // only by the resolution ceiling (see `PlanVariant`); both map to Premium here.
            "premium" | "pro" | "studio" => Some(UserTier::Premium),
            _ => None,
        }
    }

    /// Validation limits enforced in C8's Validate state.
    pub fn limits(&self) -> TierLimits {
        match self {
            UserTier::Free => TierLimits {
                max_scenes: 3,
                max_scene_seconds: 15,
                max_total_seconds: 45,
            },
            UserTier::Basic => TierLimits {
                max_scenes: 5,
                max_scene_seconds: 20,
                max_total_seconds: 90,
            },
            UserTier::Premium => TierLimits {
                max_scenes: 10,
                max_scene_seconds: 30,
                max_total_seconds: 180,
            },
        }
    }

    /// Resolution ceiling applied by the compositor before invocation (§4.7).
    ///
    /// `pro` and `studio` are two deployment-configured resolution ceilings within the
    /// `premium` tier (see `PlanVariant`); `premium` alone resolves to the `pro` ceiling.
    pub fn resolution_limit(&self) -> (u32, u32) {
        match self {
            UserTier::Free => (854, 480),
            UserTier::Basic => (1280, 720),
            UserTier::Premium => (1920, 1080),
        }
    }
}

/// Deployment-level refinement of `UserTier::Premium` distinguishing the "pro" and
/// "studio" resolution ceilings named in §4.7 but not present as distinct `user_tier`
/// values in §3. See DESIGN.md for why this is a request-level hint rather than a
/// fourth tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlanVariant {
    Pro,
    Studio,
}

impl PlanVariant {
    pub fn resolution_limit(&self) -> (u32, u32) {
        match self {
            PlanVariant::Pro => (1920, 1080),
            PlanVariant::Studio => (3840, 2160),
        }
    }
}

/// Scene/duration limits enforced during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    pub max_scenes: usize,
    pub max_scene_seconds: u32,
    pub max_total_seconds: u32,
}

/// Credit rate (credits per scene) for the `videoRender` operation, per tier.
pub fn video_render_rate(tier: UserTier) -> u32 {
    match tier {
        UserTier::Free => 1,
        UserTier::Basic => 1,
        UserTier::Premium => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_aliases_resolve_to_premium() {
        assert_eq!(UserTier::from_str_loose("pro"), Some(UserTier::Premium));
        assert_eq!(UserTier::from_str_loose("studio"), Some(UserTier::Premium));
        assert_eq!(UserTier::from_str_loose("PREMIUM"), Some(UserTier::Premium));
    }

    #[test]
    fn free_tier_limits_match_spec() {
        let limits = UserTier::Free.limits();
        assert_eq!(limits.max_scenes, 3);
        assert_eq!(limits.max_scene_seconds, 15);
        assert_eq!(limits.max_total_seconds, 45);
        assert_eq!(UserTier::Free.resolution_limit(), (854, 480));
    }

    #[test]
    fn premium_rate_doubles_free_rate() {
        assert_eq!(video_render_rate(UserTier::Premium), 2 * video_render_rate(UserTier::Free));
    }
}
