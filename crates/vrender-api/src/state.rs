//! Application state.

use std::sync::Arc;

use vrender_clipgen::{ClipGenConfig, ClipGenerator};
use vrender_compositor::Compositor;
use vrender_ledger::{CreditLedger, FirestoreClient};
use vrender_progress::ProgressBus;
use vrender_storage::BlobStore;
use vrender_worker::RenderQueue;

use crate::auth::JwksCache;
use crate::config::ApiConfig;

/// Shared application state: one handle per backing dependency, all cheap to
/// clone (C1/C2/C3/C5/C7 clients are themselves `Clone` wrappers around a
/// pooled connection, matching the worker's construction in
/// `vrender-worker/src/main.rs`).
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub storage: BlobStore,
    pub progress: ProgressBus,
    pub ledger: Arc<CreditLedger>,
    pub clipgen: Arc<ClipGenerator>,
    pub compositor: Compositor,
    pub queue: Arc<RenderQueue>,
    pub jwks: Arc<JwksCache>,
}

impl AppState {
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let storage = BlobStore::from_env().await?;

        let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let progress = ProgressBus::new(&redis_url)?;

        let firestore = FirestoreClient::from_env().await?;
        let ledger = CreditLedger::new(firestore);

        let clipgen = ClipGenerator::new(storage.clone(), ClipGenConfig::from_env());
        let compositor = Compositor::new(storage.clone());

        let queue = RenderQueue::new(&redis_url)?;
        queue.ensure_group().await?;

        let jwks = JwksCache::new().await?;

        Ok(Self {
            config,
            storage,
            progress,
            ledger: Arc::new(ledger),
            clipgen: Arc::new(clipgen),
            compositor,
            queue: Arc::new(queue),
            jwks: Arc::new(jwks),
        })
    }
}
