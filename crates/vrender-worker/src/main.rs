//! Render Orchestrator worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vrender_clipgen::{ClipGenConfig, ClipGenerator};
use vrender_ledger::{CreditLedger, FirestoreClient};
use vrender_progress::ProgressBus;
use vrender_scheduler::SchedulerConfig;
use vrender_storage::BlobStore;
use vrender_worker::{JobExecutor, RenderOrchestrator, RenderQueue, WorkerConfig};

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive("vrender=info".parse().unwrap()))
        .init();

    info!("starting vrender-worker");

    let config = WorkerConfig::from_env();
    info!(?config, "worker config loaded");

    let storage = match BlobStore::from_env().await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to initialize blob store");
            std::process::exit(1);
        }
    };

    let progress = match ProgressBus::new(&redis_url()) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "failed to initialize progress bus");
            std::process::exit(1);
        }
    };

    let ledger = {
        let firestore = match FirestoreClient::from_env().await {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "failed to initialize firestore client");
                std::process::exit(1);
            }
        };
        CreditLedger::new(firestore)
    };

    let clipgen = ClipGenerator::new(storage.clone(), ClipGenConfig::from_env());
    let compositor = vrender_compositor::Compositor::new(storage.clone());
    let scheduler_config = SchedulerConfig::new(config.max_scene_parallel);

    let orchestrator = RenderOrchestrator::new(storage, progress, ledger, clipgen, compositor, scheduler_config);

    let queue = match RenderQueue::new(&redis_url()) {
        Ok(q) => q,
        Err(e) => {
            error!(error = %e, "failed to initialize render queue");
            std::process::exit(1);
        }
    };

    let executor = Arc::new(JobExecutor::new(config, queue, orchestrator));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        signal_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!(error = %e, "executor error");
        std::process::exit(1);
    }

    info!("worker shutdown complete");
}

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}
