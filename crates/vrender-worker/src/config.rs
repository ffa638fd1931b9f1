//! Render Orchestrator worker configuration (§5, §2.2).

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum render jobs running concurrently on this instance.
    pub max_concurrent_jobs: usize,
    /// Per-render clip-phase fan-out concurrency, fed to `SchedulerConfig` (C6).
    pub max_scene_parallel: usize,
    /// Whole-render soft deadline (§5).
    pub job_timeout: Duration,
    /// Graceful shutdown timeout: how long to wait for in-flight jobs to reach
    /// a terminal state before exiting (§2.2).
    pub shutdown_timeout: Duration,
    /// Work directory for the compositor's scratch files.
    pub work_dir: String,
    /// How often the worker scans for orphaned pending jobs (§2.2).
    pub claim_interval: Duration,
    /// Minimum heartbeat idle time before a pending job can be reclaimed by
    /// another instance (§2.2).
    pub claim_min_idle: Duration,
    /// Interval for refreshing the worker-liveness heartbeat while processing
    /// a job (§5: "heartbeat every 30 s").
    pub job_heartbeat_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            max_scene_parallel: vrender_scheduler::DEFAULT_CONCURRENCY,
            job_timeout: Duration::from_secs(20 * 60),
            shutdown_timeout: Duration::from_secs(30),
            work_dir: "/tmp/vrender".to_string(),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300),
            job_heartbeat_interval: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_concurrent_jobs),
            max_scene_parallel: std::env::var("WORKER_MAX_SCENE_PARALLEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_scene_parallel),
            job_timeout: Duration::from_secs(
                std::env::var("WORKER_JOB_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default.job_timeout.as_secs()),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default.shutdown_timeout.as_secs()),
            ),
            work_dir: std::env::var("WORKER_WORK_DIR").unwrap_or(default.work_dir),
            claim_interval: Duration::from_secs(
                std::env::var("WORKER_CLAIM_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default.claim_interval.as_secs()),
            ),
            claim_min_idle: Duration::from_secs(
                std::env::var("WORKER_CLAIM_MIN_IDLE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default.claim_min_idle.as_secs()),
            ),
            job_heartbeat_interval: Duration::from_secs(
                std::env::var("WORKER_JOB_HEARTBEAT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default.job_heartbeat_interval.as_secs()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_job_timeout_matches_twenty_minute_soft_deadline() {
        assert_eq!(WorkerConfig::default().job_timeout, Duration::from_secs(1200));
    }
}
