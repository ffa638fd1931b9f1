//! Job executor: drives the durable queue into the orchestrator with
//! semaphore-bounded concurrency, graceful shutdown, and orphaned-job
//! reclamation (§2.2, §5).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::error::OrchestratorResult;
use crate::orchestrator::RenderOrchestrator;
use crate::queue::{QueuedJob, RenderQueue, MAX_DELIVERIES};

/// Job executor that consumes jobs from the durable queue and drives them
/// through the render orchestrator.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<RenderQueue>,
    orchestrator: Arc<RenderOrchestrator>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, queue: RenderQueue, orchestrator: RenderOrchestrator) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            orchestrator: Arc::new(orchestrator),
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    pub async fn run(&self) -> OrchestratorResult<()> {
        info!(
            consumer = %self.consumer_name,
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            "starting render orchestrator executor"
        );

        self.queue.ensure_group().await?;

        let mut shutdown_rx = self.shutdown.subscribe();
        let reclaim_task = self.spawn_reclaim_task();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.claim_and_spawn() => {
                    if let Err(e) = result {
                        warn!(error = %e, "error claiming from queue, backing off");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        }

        reclaim_task.abort();

        info!(timeout_secs = self.config.shutdown_timeout.as_secs(), "waiting for in-flight jobs to settle");
        let _ = tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs()).await;

        info!("executor stopped");
        Ok(())
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Background sweep that reclaims jobs whose claiming consumer went
    /// silent for longer than `claim_min_idle` (§2.2).
    fn spawn_reclaim_task(&self) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let orchestrator = Arc::clone(&self.orchestrator);
        let semaphore = Arc::clone(&self.job_semaphore);
        let consumer_name = self.consumer_name.clone();
        let interval = self.config.claim_interval;
        let min_idle = self.config.claim_min_idle;
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        match queue.claim_pending(&consumer_name, min_idle, 10).await {
                            Ok(jobs) if !jobs.is_empty() => {
                                info!(count = jobs.len(), "reclaimed orphaned jobs");
                                for job in jobs {
                                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else { break };
                                    let queue = Arc::clone(&queue);
                                    let orchestrator = Arc::clone(&orchestrator);
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::execute(orchestrator, queue, job).await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => warn!(error = %e, "failed to scan for orphaned jobs"),
                        }
                    }
                }
            }
        })
    }

    async fn claim_and_spawn(&self) -> OrchestratorResult<()> {
        if self.job_semaphore.available_permits() == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let queued = self.queue.claim_next(&self.consumer_name, Duration::from_secs(2)).await?;
        let Some(queued) = queued else { return Ok(()) };

        let permit = self
            .job_semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| crate::error::OrchestratorError::Cancelled)?;

        let queue = Arc::clone(&self.queue);
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move {
            let _permit = permit;
            Self::execute(orchestrator, queue, queued).await;
        });

        Ok(())
    }

    /// Run one job through the orchestrator, then ack, retry, or dead-letter
    /// depending on the outcome and delivery count.
    async fn execute(orchestrator: Arc<RenderOrchestrator>, queue: Arc<RenderQueue>, queued: QueuedJob) {
        let job_id = queued.job.id.to_string();
        info!(job_id = %job_id, "executing render job");

        let (_cancel_tx, cancel_rx) = watch::channel(false);

        match orchestrator.run(&queued.job, cancel_rx).await {
            Ok(outcome) => {
                info!(job_id = %job_id, cached = outcome.cached, "render job completed");
                if let Err(e) = queue.ack(&queued.message_id).await {
                    error!(job_id = %job_id, error = %e, "failed to ack completed job");
                }
            }
            Err(e) => {
                let deliveries = queue.increment_delivery(&queued.message_id).await.unwrap_or(MAX_DELIVERIES);
                if !e.is_retryable() || deliveries >= MAX_DELIVERIES {
                    warn!(job_id = %job_id, deliveries, error = %e, "job exhausted retries, moving to dead-letter stream");
                    if let Err(dlq_err) = queue.dead_letter(&queued, &e.to_string()).await {
                        error!(job_id = %job_id, error = %dlq_err, "failed to dead-letter job");
                    }
                } else {
                    info!(job_id = %job_id, deliveries, error = %e, "job failed, will be redelivered");
                }
            }
        }
    }

    async fn wait_for_jobs(&self) {
        loop {
            if self.job_semaphore.available_permits() == self.config.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
