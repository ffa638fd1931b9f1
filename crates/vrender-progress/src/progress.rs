//! Progress Bus (C2): real-time fan-out plus a durable, throttled mirror.
//!
//! Every `publish` broadcasts immediately over Redis Pub/Sub for connected
//! subscribers, but the durable sorted-set mirror used for reconnect/replay is
//! write-throttled per `job_id` (§4.2) so a fast-moving job doesn't hammer Redis
//! with a write per percentage point. Terminal updates (`done`/`error`) always
//! bypass the throttle so a client that misses the pub/sub message still
//! observes completion on its next poll.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use redis::AsyncCommands;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};
use vrender_models::{ProgressRecord, ProgressUpdate};

use crate::error::ProgressResult;

const RECORD_KEY_PREFIX: &str = "vrender:progress:record:";
const HISTORY_KEY_PREFIX: &str = "vrender:progress:history:";
const HEARTBEAT_KEY_PREFIX: &str = "vrender:progress:heartbeat:";

/// Minimum interval between durable writes for a non-terminal update (§4.2).
pub const DURABLE_WRITE_THROTTLE: Duration = Duration::from_millis(900);
/// How long a subscriber waits without any message before a heartbeat is sent.
pub const SUBSCRIBER_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Depth of the bounded per-subscriber channel. A slow subscriber drops
/// intermediate updates rather than applying backpressure to the publisher.
pub const SUBSCRIBER_BUFFER: usize = 16;
/// Progress history retention for recovery/replay.
pub const HISTORY_TTL_SECS: i64 = 3600;
/// Record TTL; outlives the job long enough for a final poll after `done`.
pub const RECORD_TTL_SECS: i64 = 86_400;

fn channel_name(job_id: &str) -> String {
    format!("vrender:progress:channel:{job_id}")
}

/// A message delivered to a progress subscriber: either a real update or a
/// synthetic keep-alive emitted when the channel has been quiet for
/// [`SUBSCRIBER_HEARTBEAT_INTERVAL`].
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Update(ProgressRecord),
    Heartbeat,
}

/// Progress Bus client. Cheap to clone; wraps a `redis::Client` plus an
/// in-memory last-write timestamp table used for the durable-write throttle.
#[derive(Clone)]
pub struct ProgressBus {
    client: redis::Client,
    last_durable_write: Arc<Mutex<HashMap<String, Instant>>>,
}

impl ProgressBus {
    pub fn new(redis_url: &str) -> ProgressResult<Self> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            last_durable_write: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Fetch the current durable record, or an initial one if none exists yet.
    pub async fn current(&self, job_id: &str) -> ProgressResult<ProgressRecord> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{RECORD_KEY_PREFIX}{job_id}");
        let raw: Option<String> = conn.get(&key).await?;
        Ok(match raw {
            Some(s) => serde_json::from_str(&s).unwrap_or_else(|_| ProgressRecord::initial(job_id)),
            None => ProgressRecord::initial(job_id),
        })
    }

    /// Merge `update` into the job's record (Invariant 1 monotonicity, §4.2),
    /// broadcast it immediately, and durably persist it subject to the
    /// write-throttle unless the update is terminal.
    pub async fn publish(&self, job_id: &str, update: ProgressUpdate) -> ProgressResult<ProgressRecord> {
        let mut record = self.current(job_id).await?;
        let now = Utc::now();
        let terminal_before = record.is_terminal();
        record.merge(update, now);

        let channel = channel_name(job_id);
        let payload = serde_json::to_string(&record)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.publish::<_, _, ()>(&channel, &payload).await?;

        let should_write_durably = record.is_terminal() || !terminal_before && self.throttle_elapsed(job_id).await;
        if should_write_durably {
            self.write_durable(job_id, &record, &payload).await?;
        }

        Ok(record)
    }

    async fn throttle_elapsed(&self, job_id: &str) -> bool {
        let mut table = self.last_durable_write.lock().await;
        let now = Instant::now();
        match table.get(job_id) {
            Some(last) if now.duration_since(*last) < DURABLE_WRITE_THROTTLE => false,
            _ => {
                table.insert(job_id.to_string(), now);
                true
            }
        }
    }

    async fn write_durable(&self, job_id: &str, record: &ProgressRecord, payload: &str) -> ProgressResult<()> {
        let record_key = format!("{RECORD_KEY_PREFIX}{job_id}");
        let history_key = format!("{HISTORY_KEY_PREFIX}{job_id}");
        let score = record.updated_at.timestamp_millis() as f64;

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::pipe()
            .set_ex(&record_key, payload, RECORD_TTL_SECS as u64)
            .ignore()
            .zadd(&history_key, payload, score)
            .ignore()
            .expire(&history_key, HISTORY_TTL_SECS)
            .ignore()
            .exec_async(&mut conn)
            .await?;

        debug!(job_id, percent = record.percent, stage = %record.stage, "durable progress write");
        Ok(())
    }

    /// Subscribe to real-time updates for `job_id`. Returns a bounded receiver:
    /// when the subscriber falls behind, the oldest buffered message is
    /// dropped (`try_send` only) rather than stalling the publisher. A
    /// heartbeat is injected whenever the channel is quiet for
    /// [`SUBSCRIBER_HEARTBEAT_INTERVAL`], so an SSE handler can keep its
    /// connection alive without a real update.
    pub async fn subscribe(&self, job_id: &str) -> ProgressResult<mpsc::Receiver<ProgressEvent>> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let channel = channel_name(job_id);
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&channel).await?;

        tokio::spawn(async move {
            use futures_util::StreamExt;
            let mut stream = pubsub.into_on_message();
            loop {
                let next = tokio::time::timeout(SUBSCRIBER_HEARTBEAT_INTERVAL, stream.next()).await;
                let event = match next {
                    Ok(Some(msg)) => {
                        let payload: String = match msg.get_payload() {
                            Ok(p) => p,
                            Err(_) => continue,
                        };
                        match serde_json::from_str::<ProgressRecord>(&payload) {
                            Ok(record) => ProgressEvent::Update(record),
                            Err(_) => continue,
                        }
                    }
                    Ok(None) => break,
                    Err(_) => ProgressEvent::Heartbeat,
                };

                if tx.try_send(event).is_err() {
                    warn!(job_id = "unknown", "progress subscriber buffer full, dropping update");
                }
            }
        });

        Ok(rx)
    }

    /// Replay history since `since_ms` for a client reconnecting after a gap.
    pub async fn history_since(&self, job_id: &str, since_ms: i64) -> ProgressResult<Vec<ProgressRecord>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{HISTORY_KEY_PREFIX}{job_id}");
        let entries: Vec<String> = conn.zrangebyscore(&key, since_ms as f64, "+inf").await?;
        Ok(entries
            .into_iter()
            .filter_map(|s| serde_json::from_str(&s).ok())
            .collect())
    }

    /// Worker liveness heartbeat, distinct from the subscriber keep-alive
    /// above: this one tracks whether the render worker processing `job_id` is
    /// still alive, for the orphaned-job reclamation sweep (§2.2).
    pub async fn worker_heartbeat(&self, job_id: &str, ttl_secs: u64) -> ProgressResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{HEARTBEAT_KEY_PREFIX}{job_id}");
        conn.set_ex::<_, _, ()>(&key, Utc::now().timestamp(), ttl_secs).await?;
        Ok(())
    }

    pub async fn worker_is_alive(&self, job_id: &str) -> ProgressResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{HEARTBEAT_KEY_PREFIX}{job_id}");
        Ok(conn.exists(&key).await?)
    }

    pub async fn clear_worker_heartbeat(&self, job_id: &str) -> ProgressResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{HEARTBEAT_KEY_PREFIX}{job_id}");
        conn.del::<_, ()>(&key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_name_is_namespaced_per_job() {
        assert_eq!(channel_name("job-1"), "vrender:progress:channel:job-1");
    }
}
