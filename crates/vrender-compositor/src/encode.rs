//! Encode profile table and resolution clamping (§4.7).

use vrender_models::plan::{PlanVariant, UserTier};
use vrender_models::render_request::ExportPreset;

/// Fixed `(preset, crf, profile, level, bitrate)` tuple for one export target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeProfile {
    pub preset: &'static str,
    pub crf: u8,
    pub profile: &'static str,
    pub level: &'static str,
    pub bitrate: &'static str,
}

pub fn encode_profile(export_preset: ExportPreset) -> EncodeProfile {
    match export_preset {
        ExportPreset::Youtube => EncodeProfile {
            preset: "slow",
            crf: 18,
            profile: "high",
            level: "4.1",
            bitrate: "8M",
        },
        ExportPreset::Tiktok => EncodeProfile {
            preset: "medium",
            crf: 20,
            profile: "main",
            level: "4.0",
            bitrate: "5M",
        },
        ExportPreset::Square => EncodeProfile {
            preset: "medium",
            crf: 22,
            profile: "main",
            level: "3.1",
            bitrate: "4M",
        },
        ExportPreset::Custom => EncodeProfile {
            preset: "medium",
            crf: 22,
            profile: "main",
            level: "4.0",
            bitrate: "4M",
        },
    }
}

/// Resolution ceiling for `tier`, refined by an optional deployment-level
/// `plan_variant` hint within the premium tier (see DESIGN.md).
pub fn resolution_ceiling(tier: UserTier, plan_variant: Option<PlanVariant>) -> (u32, u32) {
    match (tier, plan_variant) {
        (UserTier::Premium, Some(variant)) => variant.resolution_limit(),
        (tier, _) => tier.resolution_limit(),
    }
}

/// Clamp a requested `(width, height)` to the tier's ceiling, preserving
/// aspect ratio by shrinking the longer side first.
pub fn clamp_resolution(width: u32, height: u32, ceiling: (u32, u32)) -> (u32, u32) {
    let (max_w, max_h) = ceiling;
    if width <= max_w && height <= max_h {
        return (even(width), even(height));
    }

    let scale_w = max_w as f64 / width as f64;
    let scale_h = max_h as f64 / height as f64;
    let scale = scale_w.min(scale_h);

    (
        even((width as f64 * scale).round() as u32),
        even((height as f64 * scale).round() as u32),
    )
}

/// ffmpeg's yuv420p encoders require even dimensions.
fn even(v: u32) -> u32 {
    if v % 2 == 0 {
        v.max(2)
    } else {
        v + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn youtube_profile_matches_table() {
        let p = encode_profile(ExportPreset::Youtube);
        assert_eq!(p.preset, "slow");
        assert_eq!(p.crf, 18);
        assert_eq!(p.bitrate, "8M");
    }

    #[test]
    fn resolution_passthrough_under_ceiling() {
        assert_eq!(clamp_resolution(640, 360, (1920, 1080)), (640, 360));
    }

    #[test]
    fn resolution_clamped_preserving_aspect() {
        let (w, h) = clamp_resolution(3840, 2160, (1920, 1080));
        assert_eq!((w, h), (1920, 1080));
    }

    #[test]
    fn portrait_resolution_clamps_on_height() {
        let (w, h) = clamp_resolution(1080, 1920, (854, 480));
        assert!(h <= 480);
        assert!(w <= 854);
    }

    #[test]
    fn studio_variant_exceeds_bare_premium_ceiling() {
        let ceiling = resolution_ceiling(UserTier::Premium, Some(PlanVariant::Studio));
        assert_eq!(ceiling, (3840, 2160));
    }
}
