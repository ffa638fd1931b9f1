//! Preflight check run before a worker instance joins the pool: ffmpeg/ffprobe
//! presence, scratch directory writability, and storage/queue credential
//! wiring (§2.2).

use std::path::Path;

use vrender_compositor::command::{check_ffmpeg, check_ffprobe};
use vrender_storage::BlobStore;
use vrender_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env();

    println!("worker-selfcheck: starting with work_dir={}", config.work_dir);
    ensure_workdir(&config.work_dir).await?;

    check_ffmpeg().map_err(|e| anyhow::anyhow!("ffmpeg not available: {e}"))?;
    check_ffprobe().map_err(|e| anyhow::anyhow!("ffprobe not available: {e}"))?;
    println!("worker-selfcheck: ffmpeg/ffprobe ok");

    ensure_env_present(&["REDIS_URL"])?;

    let storage = BlobStore::from_env().await.map_err(|e| anyhow::anyhow!("blob store config invalid: {e}"))?;
    storage.check_connectivity().await.map_err(|e| anyhow::anyhow!("blob store unreachable: {e}"))?;
    println!("worker-selfcheck: blob store ok");

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
