//! Compositor (C7): the deterministic assembly pipeline that turns per-scene
//! clips/images, narration, optional music, and optional subtitles into one
//! final MP4, uploaded via the Artifact Store Adapter (C1).
//!
//! Implemented as a sequence of ffmpeg filter-graph passes over a local
//! scratch directory: per-scene normalization, subtitle burn-in, concat,
//! audio sync, and a final encode against a fixed per-export-preset profile.

pub mod audio;
pub mod command;
pub mod compositor;
pub mod concat;
pub mod encode;
pub mod error;
pub mod probe;
pub mod progress;
pub mod scene_pass;
pub mod subtitles;
pub mod watermark;

pub use command::{FfmpegCommand, FfmpegRunner};
pub use compositor::{ComposeProgressCallback, CompositeOutput, CompositeRequest, Compositor, SceneInput};
pub use encode::{clamp_resolution, encode_profile, resolution_ceiling, EncodeProfile};
pub use error::{CompositorError, CompositorResult};
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use scene_pass::{render_scene_pass, SceneSource};
pub use subtitles::{extract_scene_subtitles, parse_srt, subtitle_filter, SrtEntry};
pub use watermark::{append_watermark, build_watermark_filter, WatermarkStyle};
