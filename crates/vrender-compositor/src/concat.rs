//! Scene concatenation: stream-copy concat first, transcode-concat fallback
//! (§4.7, §7).

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::encode::EncodeProfile;
use crate::error::{CompositorError, CompositorResult};

fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', "'\\''")
}

fn build_concat_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("file '{}'", escape_concat_path(p)))
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}

/// Try the cheap path: concat demuxer with `-c copy`. Requires all inputs to
/// share codec/resolution/timebase, which per-scene passes already guarantee.
async fn concat_stream_copy(list_path: &Path, output: &Path) -> CompositorResult<()> {
    let args = [
        "-y",
        "-v",
        "error",
        "-f",
        "concat",
        "-safe",
        "0",
        "-i",
        &list_path.to_string_lossy(),
        "-c",
        "copy",
        &output.to_string_lossy(),
    ];

    let result = tokio::process::Command::new("ffmpeg").args(args).output().await?;

    if result.status.success() {
        Ok(())
    } else {
        Err(CompositorError::ConcatFailed(
            String::from_utf8_lossy(&result.stderr).into_owned(),
        ))
    }
}

/// Fallback path: a `concat` filter graph with a full re-encode, used when
/// stream-copy concat rejects the inputs (e.g. drift introduced by an
/// upstream provider's clip encode).
async fn concat_transcode(
    paths: &[PathBuf],
    output: &Path,
    profile: EncodeProfile,
    width: u32,
    height: u32,
) -> CompositorResult<()> {
    let mut args: Vec<String> = vec!["-y".to_string(), "-v".to_string(), "error".to_string()];
    for p in paths {
        args.push("-i".to_string());
        args.push(p.to_string_lossy().to_string());
    }

    let scaled: Vec<String> = (0..paths.len())
        .map(|i| format!("[{i}:v]scale={width}:{height},setsar=1[v{i}]"))
        .collect();
    let inputs: String = (0..paths.len()).map(|i| format!("[v{i}]")).collect();
    let filter = format!(
        "{};{}concat=n={}:v=1:a=0[outv]",
        scaled.join(";"),
        inputs,
        paths.len()
    );

    args.extend([
        "-filter_complex".to_string(),
        filter,
        "-map".to_string(),
        "[outv]".to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        profile.preset.to_string(),
        "-crf".to_string(),
        profile.crf.to_string(),
        "-profile:v".to_string(),
        profile.profile.to_string(),
        "-level".to_string(),
        profile.level.to_string(),
        output.to_string_lossy().to_string(),
    ]);

    debug!(args = ?args, "transcode-concat fallback");

    let result = tokio::process::Command::new("ffmpeg").args(&args).output().await?;

    if result.status.success() {
        Ok(())
    } else {
        Err(CompositorError::transcode_failed(
            "transcode-concat fallback failed",
            Some(String::from_utf8_lossy(&result.stderr).into_owned()),
            result.status.code(),
        ))
    }
}

/// Concatenate `paths` in order into `output`: stream-copy first, falling
/// back to a full transcode on failure.
pub async fn concat_scenes(
    paths: &[PathBuf],
    output: &Path,
    profile: EncodeProfile,
    width: u32,
    height: u32,
) -> CompositorResult<()> {
    let list_dir = tempfile::tempdir()?;
    let list_path = list_dir.path().join("concat.txt");
    tokio::fs::write(&list_path, build_concat_list(paths)).await?;

    match concat_stream_copy(&list_path, output).await {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(error = %e, "stream-copy concat failed, falling back to transcode");
            concat_transcode(paths, output, profile, width, height).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_list_quotes_each_path() {
        let list = build_concat_list(&[PathBuf::from("/tmp/a.mp4"), PathBuf::from("/tmp/b.mp4")]);
        assert_eq!(list, "file '/tmp/a.mp4'\nfile '/tmp/b.mp4'\n");
    }

    #[test]
    fn concat_list_escapes_single_quotes() {
        let list = build_concat_list(&[PathBuf::from("/tmp/it's.mp4")]);
        assert!(list.contains("it'\\''s"));
    }
}
