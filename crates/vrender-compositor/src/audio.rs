//! Audio synchronization pass: narration trim + fade, optional ducked music
//! mix, and final mux onto the silent composed video (§4.7, P5).

use std::path::Path;

use tracing::{debug, info};

use crate::error::{CompositorError, CompositorResult};

const NARRATION_FADE_SECONDS: f64 = 1.0;

/// Build the `filter_complex` graph mixing narration (input index 1) with an
/// optional music track (input index 2) ducked underneath it, trimmed to
/// `total_duration` with the fade starting at `max(0, total_duration - 1)`.
///
/// Returns the filter string and the label carrying the final audio stream.
pub fn build_audio_filter(total_duration: f64, has_music: bool) -> (String, &'static str) {
    let fade_start = (total_duration - NARRATION_FADE_SECONDS).max(0.0);
    let narration = format!(
        "[1:a]atrim=0:{total_duration:.3},afade=t=out:st={fade_start:.3}:d={NARRATION_FADE_SECONDS:.1}[narr]"
    );

    if !has_music {
        return (narration, "narr");
    }

    let music = format!(
        "[2:a]atrim=0:{total_duration:.3},volume=0.3[mvol];\
         [mvol][narr]sidechaincompress=threshold=0.05:ratio=6:attack=5:release=300[mduck];\
         [narr][mduck]amix=inputs=2:duration=first[aout]"
    );

    (format!("{narration};{music}"), "aout")
}

/// Mix the video's existing (silent) stream with narration and optional
/// music, producing a single muxed output. `video` supplies the `0:v`
/// stream; narration is input `1`; music, if present, is input `2`.
pub async fn mux_with_audio(
    video: impl AsRef<Path>,
    narration: impl AsRef<Path>,
    music: Option<&Path>,
    total_duration: f64,
    output: impl AsRef<Path>,
    audio_codec: &str,
    audio_bitrate: &str,
) -> CompositorResult<()> {
    let video = video.as_ref();
    let narration = narration.as_ref();
    let output = output.as_ref();

    let (filter_complex, out_label) = build_audio_filter(total_duration, music.is_some());

    let mut args: Vec<String> = vec![
        "-y".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-i".to_string(),
        video.to_string_lossy().to_string(),
        "-i".to_string(),
        narration.to_string_lossy().to_string(),
    ];
    if let Some(music) = music {
        args.push("-i".to_string());
        args.push(music.to_string_lossy().to_string());
    }
    args.extend([
        "-filter_complex".to_string(),
        filter_complex,
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        format!("[{out_label}]"),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        audio_codec.to_string(),
        "-b:a".to_string(),
        audio_bitrate.to_string(),
        "-shortest".to_string(),
        output.to_string_lossy().to_string(),
    ]);

    debug!(args = ?args, "running audio mix");

    let result = tokio::process::Command::new("ffmpeg").args(&args).output().await?;

    if !result.status.success() {
        return Err(CompositorError::filter_failed(
            "audio mix failed",
            Some(String::from_utf8_lossy(&result.stderr).into_owned()),
        ));
    }

    info!(output = %output.display(), "audio sync complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_starts_one_second_before_total() {
        let (filter, label) = build_audio_filter(15.0, false);
        assert!(filter.contains("st=14.000"));
        assert_eq!(label, "narr");
        assert!(!filter.contains("amix"));
    }

    #[test]
    fn short_total_clamps_fade_start_to_zero() {
        let (filter, _) = build_audio_filter(0.5, false);
        assert!(filter.contains("st=0.000"));
    }

    #[test]
    fn music_present_adds_ducking_and_mix() {
        let (filter, label) = build_audio_filter(20.0, true);
        assert!(filter.contains("sidechaincompress=threshold=0.05:ratio=6:attack=5:release=300"));
        assert!(filter.contains("amix=inputs=2:duration=first"));
        assert!(filter.contains("volume=0.3"));
        assert_eq!(label, "aout");
    }
}
