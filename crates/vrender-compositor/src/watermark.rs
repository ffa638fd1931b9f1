//! Free-tier watermark: a lower-right text overlay burned onto the final
//! render when the resolved plan is `free` (§4.7).

use crate::command::FfmpegCommand;

/// Fixed watermark style. The free tier gets a small, unobtrusive label;
/// there's no per-request configuration for it.
#[derive(Debug, Clone)]
pub struct WatermarkStyle {
    pub text: String,
    pub font_size: u32,
    pub margin: u32,
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        Self {
            text: "Made with vrender".to_string(),
            font_size: 16,
            margin: 24,
        }
    }
}

fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Build the `drawtext` filter fragment placing the watermark in the
/// bottom-right corner with `margin` pixels of padding on each edge.
pub fn build_watermark_filter(style: &WatermarkStyle) -> String {
    format!(
        "drawtext=text='{}':fontsize={}:fontcolor=white@0.85:box=1:boxcolor=black@0.4:boxborderw=6:x=w-text_w-{}:y=h-text_h-{}",
        escape_drawtext(&style.text),
        style.font_size,
        style.margin,
        style.margin,
    )
}

/// Append the watermark filter to an existing video-filter chain (comma
/// separated ffmpeg `-vf` chain), or return it standalone if nothing came
/// before it.
pub fn append_watermark(existing_filter: Option<&str>, style: &WatermarkStyle) -> String {
    let watermark = build_watermark_filter(style);
    match existing_filter {
        Some(f) if !f.is_empty() => format!("{f},{watermark}"),
        _ => watermark,
    }
}

/// Apply the watermark to a command's video filter in place.
pub fn with_watermark(cmd: FfmpegCommand, existing_filter: Option<&str>, style: &WatermarkStyle) -> FfmpegCommand {
    cmd.video_filter(append_watermark(existing_filter, style))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_places_text_bottom_right() {
        let filter = build_watermark_filter(&WatermarkStyle::default());
        assert!(filter.contains("x=w-text_w-24"));
        assert!(filter.contains("y=h-text_h-24"));
    }

    #[test]
    fn escapes_colons_in_text() {
        let style = WatermarkStyle {
            text: "free: preview".to_string(),
            ..WatermarkStyle::default()
        };
        let filter = build_watermark_filter(&style);
        assert!(filter.contains("free\\: preview"));
    }

    #[test]
    fn appends_to_existing_chain() {
        let combined = append_watermark(Some("scale=640:360"), &WatermarkStyle::default());
        assert!(combined.starts_with("scale=640:360,drawtext"));
    }

    #[test]
    fn standalone_when_no_existing_filter() {
        let combined = append_watermark(None, &WatermarkStyle::default());
        assert!(combined.starts_with("drawtext"));
    }
}
