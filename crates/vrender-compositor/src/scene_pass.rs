//! Per-scene pass (§4.7): normalize one scene's source — a generated clip, a
//! still image with camera motion, or nothing at all — into a silent clip of
//! exactly `duration_i` seconds at the target resolution.

use std::path::{Path, PathBuf};

use tracing::debug;

use vrender_models::scene::Camera;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::encode::EncodeProfile;
use crate::error::{CompositorError, CompositorResult};

/// Default frame rate used for the `zoompan` camera-motion passes and the
/// black-frame fallback. Final encode does not re-derive fps from this; it's
/// purely the per-scene pass's working rate.
const SCENE_FPS: u32 = 30;

const ZOOM_IN_RANGE: (f64, f64) = (1.0, 1.3);
const ZOOM_OUT_RANGE: (f64, f64) = (1.3, 1.0);
const PAN_ZOOM: f64 = 1.1;
const PAN_AMPLITUDE_PX: f64 = 50.0;

/// What scene `i` has available to build its pass from.
#[derive(Debug, Clone)]
pub enum SceneSource {
    Clip(PathBuf),
    Image(PathBuf),
    None,
}

fn scale_crop_filter(width: u32, height: u32) -> String {
    format!("scale={width}:{height}:force_original_aspect_ratio=increase,crop={width}:{height},setsar=1")
}

/// Build the `zoompan` filter for a still image looped to `duration` seconds
/// with the given camera motion. `static` motion never reaches this path (it
/// uses a plain scale/crop instead).
fn zoompan_filter(camera: Camera, duration: f64, width: u32, height: u32) -> String {
    let frames = ((duration * SCENE_FPS as f64).round() as u64).max(1);
    let last = (frames - 1).max(1);

    let (z_expr, x_expr, y_expr) = match camera {
        Camera::ZoomIn => {
            let (from, to) = ZOOM_IN_RANGE;
            (
                format!("{from}+{:.4}*on/{last}", to - from),
                "(iw-iw/zoom)/2".to_string(),
                "(ih-ih/zoom)/2".to_string(),
            )
        }
        Camera::ZoomOut => {
            let (from, to) = ZOOM_OUT_RANGE;
            (
                format!("{from}{:+.4}*on/{last}", to - from),
                "(iw-iw/zoom)/2".to_string(),
                "(ih-ih/zoom)/2".to_string(),
            )
        }
        Camera::PanLeft | Camera::PanRight => {
            let sign = if matches!(camera, Camera::PanRight) { "" } else { "-" };
            (
                PAN_ZOOM.to_string(),
                format!(
                    "(iw-iw/zoom)/2+{sign}{PAN_AMPLITUDE_PX}*sin(2*PI*(on/{SCENE_FPS})/{duration:.3})"
                ),
                "(ih-ih/zoom)/2".to_string(),
            )
        }
        Camera::Static => unreachable!("static motion does not use zoompan"),
    };

    format!(
        "zoompan=z='{z_expr}':x='{x_expr}':y='{y_expr}':d={frames}:s={width}x{height}:fps={SCENE_FPS}"
    )
}

async fn run_clip_pass(
    clip: &Path,
    output: &Path,
    duration: f64,
    width: u32,
    height: u32,
    profile: EncodeProfile,
) -> CompositorResult<()> {
    let cmd = FfmpegCommand::new(clip, output)
        .duration(duration)
        .video_filter(scale_crop_filter(width, height))
        .video_codec("libx264")
        .preset(profile.preset)
        .crf(profile.crf)
        .audio_codec("copy");

    FfmpegRunner::new().run(&cmd).await
}

async fn run_image_pass(
    image: &Path,
    output: &Path,
    duration: f64,
    camera: Camera,
    width: u32,
    height: u32,
    profile: EncodeProfile,
) -> CompositorResult<()> {
    let filter = match camera {
        Camera::Static => scale_crop_filter(width, height),
        _ => zoompan_filter(camera, duration, width, height),
    };

    let cmd = FfmpegCommand::new(image, output)
        .input_arg("-loop")
        .input_arg("1")
        .duration(duration)
        .video_filter(filter)
        .video_codec("libx264")
        .preset(profile.preset)
        .crf(profile.crf);

    FfmpegRunner::new().run(&cmd).await
}

/// Black-frame fallback doesn't have a real input file, so it's built from
/// ffmpeg's `lavfi` color source directly rather than through
/// [`FfmpegCommand`].
async fn run_black_frame_pass(
    output: &Path,
    duration: f64,
    width: u32,
    height: u32,
    profile: EncodeProfile,
) -> CompositorResult<()> {
    let args = [
        "-y".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        format!("color=c=black:s={width}x{height}:d={duration:.3}:r={SCENE_FPS}"),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        profile.preset.to_string(),
        "-crf".to_string(),
        profile.crf.to_string(),
        output.to_string_lossy().to_string(),
    ];

    debug!(duration, width, height, "black-frame fallback pass");

    let result = tokio::process::Command::new("ffmpeg").args(args).output().await?;
    if result.status.success() {
        Ok(())
    } else {
        Err(CompositorError::transcode_failed(
            "black-frame pass failed",
            Some(String::from_utf8_lossy(&result.stderr).into_owned()),
            result.status.code(),
        ))
    }
}

/// Produce scene `index`'s normalized, silent clip at `scratch_dir/scene-pass-{index}.mp4`.
pub async fn render_scene_pass(
    scratch_dir: &Path,
    index: u32,
    source: SceneSource,
    duration: f64,
    camera: Camera,
    width: u32,
    height: u32,
    profile: EncodeProfile,
) -> CompositorResult<PathBuf> {
    let output = scratch_dir.join(format!("scene-pass-{index}.mp4"));

    match source {
        SceneSource::Clip(clip) => run_clip_pass(&clip, &output, duration, width, height, profile).await?,
        SceneSource::Image(image) => {
            run_image_pass(&image, &output, duration, camera, width, height, profile).await?
        }
        SceneSource::None => run_black_frame_pass(&output, duration, width, height, profile).await?,
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_motion_uses_plain_scale_crop() {
        let filter = scale_crop_filter(1280, 720);
        assert!(filter.contains("scale=1280:720"));
        assert!(filter.contains("crop=1280:720"));
    }

    #[test]
    fn zoom_in_grows_from_one_to_one_point_three() {
        let filter = zoompan_filter(Camera::ZoomIn, 5.0, 1280, 720);
        assert!(filter.contains("z='1+0.3000*on/149'"));
    }

    #[test]
    fn zoom_out_shrinks_from_one_point_three_to_one() {
        let filter = zoompan_filter(Camera::ZoomOut, 5.0, 1280, 720);
        assert!(filter.contains("z='1.3-0.3000*on/149'"));
    }

    #[test]
    fn pan_left_uses_negative_sine_offset() {
        let filter = zoompan_filter(Camera::PanLeft, 4.0, 1280, 720);
        assert!(filter.contains("x='(iw-iw/zoom)/2+-50*sin"));
        assert!(filter.contains("z='1.1'"));
    }

    #[test]
    fn pan_right_uses_positive_sine_offset() {
        let filter = zoompan_filter(Camera::PanRight, 4.0, 1280, 720);
        assert!(filter.contains("x='(iw-iw/zoom)/2+50*sin"));
    }
}
