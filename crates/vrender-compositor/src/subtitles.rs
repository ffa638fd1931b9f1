//! SRT parsing and scene-local subtitle extraction/burn-in (§4.7, §6, P4).
//!
//! Burn-in uses a fixed style: font size 18, white primary, black outline,
//! margin-V 25. Scene extraction shifts global timestamps by the scene's
//! offset into `[0, duration_i)` and drops/clips entries outside that window.

use std::path::Path;

use crate::command::FfmpegCommand;
use crate::error::{CompositorError, CompositorResult};

#[derive(Debug, Clone, PartialEq)]
pub struct SrtEntry {
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
}

/// Parse an SRT document into entries. Malformed blocks are skipped rather
/// than failing the whole parse — subtitle burn-in is best-effort.
pub fn parse_srt(content: &str) -> Vec<SrtEntry> {
    let mut entries = Vec::new();
    let normalized = content.replace("\r\n", "\n");

    for block in normalized.split("\n\n") {
        let mut lines = block.lines();
        let Some(first) = lines.next() else { continue };

        // The first line is either the numeric index or (if absent) the
        // timing line itself.
        let timing_line = if first.contains("-->") {
            Some(first)
        } else {
            lines.next()
        };
        let Some(timing_line) = timing_line else { continue };
        let Some((start, end)) = timing_line.split_once("-->") else { continue };
        let (Some(start_ms), Some(end_ms)) = (parse_timestamp(start.trim()), parse_timestamp(end.trim())) else {
            continue;
        };

        let text = lines.collect::<Vec<_>>().join("\n");
        entries.push(SrtEntry { start_ms, end_ms, text });
    }

    entries
}

/// Parse `HH:MM:SS,mmm` into milliseconds.
fn parse_timestamp(ts: &str) -> Option<i64> {
    let (hms, millis) = ts.split_once(',')?;
    let mut parts = hms.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: i64 = parts.next()?.parse().ok()?;
    let millis: i64 = millis.trim().parse().ok()?;
    Some(((hours * 3600 + minutes * 60 + seconds) * 1000) + millis)
}

fn format_timestamp(ms: i64) -> String {
    let ms = ms.max(0);
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Shift global timestamps by `-scene_start_ms` and clip to `[0, duration_ms)`
/// (P4: every burnt entry for scene `i` lies in `[0, duration_i)`). Entries
/// entirely outside the scene window are dropped.
pub fn extract_scene_subtitles(
    entries: &[SrtEntry],
    scene_start_ms: i64,
    duration_ms: i64,
) -> Vec<SrtEntry> {
    entries
        .iter()
        .filter_map(|e| {
            let start = e.start_ms - scene_start_ms;
            let end = e.end_ms - scene_start_ms;
            if end <= 0 || start >= duration_ms {
                return None;
            }
            Some(SrtEntry {
                start_ms: start.clamp(0, duration_ms),
                end_ms: end.clamp(0, duration_ms),
                text: e.text.clone(),
            })
        })
        .filter(|e| e.end_ms > e.start_ms)
        .collect()
}

pub fn write_srt(entries: &[SrtEntry]) -> String {
    let mut out = String::new();
    for (i, e) in entries.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_timestamp(e.start_ms),
            format_timestamp(e.end_ms),
            e.text,
        ));
    }
    out
}

fn escape_subtitles_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Fixed burn-in style named in §4.7: font size 18, white primary, black
/// outline, margin-V 25.
pub fn subtitle_filter(srt_path: &Path) -> String {
    format!(
        "subtitles='{}':force_style='FontSize=18,PrimaryColour=&H00FFFFFF,OutlineColour=&H00000000,MarginV=25'",
        escape_subtitles_path(srt_path),
    )
}

/// Burn `srt_path` into `input`, writing `output`. On filter failure, the
/// caller is expected to retry the same scene via [`without_subtitles`].
pub async fn burn_subtitles(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    srt_path: &Path,
    base_filter: Option<&str>,
) -> CompositorResult<FfmpegCommand> {
    let filter = match base_filter {
        Some(f) if !f.is_empty() => format!("{f},{}", subtitle_filter(srt_path)),
        _ => subtitle_filter(srt_path),
    };
    Ok(FfmpegCommand::new(input, output).video_filter(filter))
}

/// Guard against a caller accidentally trying to burn an empty SRT.
pub fn has_entries(entries: &[SrtEntry]) -> CompositorResult<()> {
    if entries.is_empty() {
        return Err(CompositorError::InvalidInput("no subtitle entries for scene".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1\n00:00:01,000 --> 00:00:03,500\nHello there\n\n2\n00:00:04,000 --> 00:00:06,000\nSecond line\n";

    #[test]
    fn parses_entries_and_timestamps() {
        let entries = parse_srt(SAMPLE);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].start_ms, 1000);
        assert_eq!(entries[0].end_ms, 3500);
        assert_eq!(entries[0].text, "Hello there");
    }

    #[test]
    fn round_trips_through_write_srt() {
        let entries = parse_srt(SAMPLE);
        let written = write_srt(&entries);
        let reparsed = parse_srt(&written);
        assert_eq!(entries, reparsed);
    }

    #[test]
    fn scene_extraction_shifts_and_clips_into_window() {
        // Global entries at [1s,3.5s] and [4s,6s]; scene 2 starts at 3s, is 4s long.
        let entries = parse_srt(SAMPLE);
        let scene = extract_scene_subtitles(&entries, 3000, 4000);
        assert_eq!(scene.len(), 2);
        // First entry overlaps [1,3.5) shifted by -3s => [-2,0.5) clipped to [0,0.5)
        assert_eq!(scene[0].start_ms, 0);
        assert_eq!(scene[0].end_ms, 500);
        // Second entry [4,6) shifted by -3s => [1,3), within [0,4)
        assert_eq!(scene[1].start_ms, 1000);
        assert_eq!(scene[1].end_ms, 3000);
        for e in &scene {
            assert!(e.start_ms >= 0 && e.end_ms <= 4000);
        }
    }

    #[test]
    fn entries_entirely_outside_window_are_dropped() {
        let entries = parse_srt(SAMPLE);
        let scene = extract_scene_subtitles(&entries, 20_000, 2000);
        assert!(scene.is_empty());
    }

    #[test]
    fn fixed_style_is_applied() {
        let filter = subtitle_filter(Path::new("scene-0.srt"));
        assert!(filter.contains("FontSize=18"));
        assert!(filter.contains("MarginV=25"));
    }
}
