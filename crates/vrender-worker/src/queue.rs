//! Durable render-job queue: a Redis Stream consumer group generalizing this
//! codebase's claim/ack/retry/dead-letter job-executor shape (§4.8 "ambient")
//! to the single `RenderJob` type this subsystem drives. No standalone queue
//! crate exists in this workspace, so the queue lives alongside the
//! orchestrator that is its only consumer.

use std::collections::HashMap;
use std::time::Duration;

use redis::streams::{StreamClaimOptions, StreamClaimReply, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tracing::{debug, warn};
use vrender_models::job::RenderJob;

pub const STREAM_KEY: &str = "vrender:queue:render";
pub const DLQ_STREAM_KEY: &str = "vrender:queue:render:dlq";
pub const GROUP_NAME: &str = "vrender-workers";
const DEDUP_PREFIX: &str = "vrender:queue:dedup:";
const DEDUP_TTL_SECS: u64 = 24 * 60 * 60;
const RETRIES_KEY: &str = "vrender:queue:retries";
pub const MAX_DELIVERIES: u32 = 3;

/// One message pulled off the stream, paired with its deserialized job.
pub struct QueuedJob {
    pub message_id: String,
    pub job: RenderJob,
}

#[derive(Clone)]
pub struct RenderQueue {
    client: redis::Client,
}

fn decode_payload(fields: &HashMap<String, redis::Value>) -> Option<RenderJob> {
    let value = fields.get("payload")?;
    let raw: String = redis::from_redis_value(value).ok()?;
    serde_json::from_str(&raw).ok()
}

impl RenderQueue {
    pub fn new(redis_url: &str) -> redis::RedisResult<Self> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
        })
    }

    /// Create the consumer group if it doesn't exist yet. `BUSYGROUP` (already
    /// exists) is not an error here.
    pub async fn ensure_group(&self) -> redis::RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let result: redis::RedisResult<()> = conn.xgroup_create_mkstream(STREAM_KEY, GROUP_NAME, "0").await;
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Enqueue `job`, deduplicating on its dedup key (P7: a redrive of an
    /// already-queued `job_id` is a no-op). Returns whether a new entry was
    /// actually added.
    pub async fn enqueue(&self, job: &RenderJob) -> redis::RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let dedup_key = format!("{DEDUP_PREFIX}{}", job.dedup_key());

        let inserted: Option<String> = redis::cmd("SET")
            .arg(&dedup_key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(DEDUP_TTL_SECS)
            .query_async(&mut conn)
            .await?;
        if inserted.is_none() {
            debug!(job_id = %job.id, "job already queued, skipping duplicate enqueue");
            return Ok(false);
        }

        let payload = serde_json::to_string(job).expect("RenderJob always serializes");
        let _id: String = conn.xadd(STREAM_KEY, "*", &[("payload", payload)]).await?;
        Ok(true)
    }

    /// Pull up to one new job for `consumer`, blocking up to `block` for one
    /// to arrive.
    pub async fn claim_next(&self, consumer: &str, block: Duration) -> redis::RedisResult<Option<QueuedJob>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let opts = StreamReadOptions::default()
            .group(GROUP_NAME, consumer)
            .count(1)
            .block(block.as_millis() as usize);
        let reply: StreamReadReply = conn.xread_options(&[STREAM_KEY], &[">"], &opts).await?;

        for key in reply.keys {
            for id in key.ids {
                if let Some(job) = decode_payload(&id.map) {
                    return Ok(Some(QueuedJob {
                        message_id: id.id,
                        job,
                    }));
                }
                warn!(message_id = %id.id, "dropping undecodable queue entry");
                self.ack(&id.id).await.ok();
            }
        }
        Ok(None)
    }

    /// Reclaim messages pending for longer than `min_idle` from crashed
    /// consumers, attributing them to `consumer` (§2.2 orphaned-job
    /// reclamation).
    pub async fn claim_pending(&self, consumer: &str, min_idle: Duration, count: usize) -> redis::RedisResult<Vec<QueuedJob>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let pending: Vec<(String, String, i64, i64)> = redis::cmd("XPENDING")
            .arg(STREAM_KEY)
            .arg(GROUP_NAME)
            .arg("IDLE")
            .arg(min_idle.as_millis() as i64)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut conn)
            .await
            .unwrap_or_default();

        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = pending.into_iter().map(|(id, ..)| id).collect();
        let claim_opts = StreamClaimOptions::default();
        let reply: StreamClaimReply = conn
            .xclaim_options(STREAM_KEY, GROUP_NAME, consumer, 0, &ids, claim_opts)
            .await?;

        let mut jobs = Vec::new();
        for id in reply.ids {
            match decode_payload(&id.map) {
                Some(job) => jobs.push(QueuedJob { message_id: id.id, job }),
                None => {
                    warn!(message_id = %id.id, "dropping undecodable reclaimed entry");
                    self.ack(&id.id).await.ok();
                }
            }
        }
        Ok(jobs)
    }

    /// Cheap connectivity probe and current stream depth, used by the API's
    /// readiness check and queue-length metric.
    pub async fn len(&self) -> redis::RedisResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.xlen(STREAM_KEY).await
    }

    pub async fn ack(&self, message_id: &str) -> redis::RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: i64 = conn.xack(STREAM_KEY, GROUP_NAME, &[message_id]).await?;
        self.clear_dedup_and_retries(&mut conn, message_id).await
    }

    async fn clear_dedup_and_retries(&self, conn: &mut redis::aio::MultiplexedConnection, message_id: &str) -> redis::RedisResult<()> {
        let _: i64 = conn.hdel(RETRIES_KEY, message_id).await.unwrap_or(0);
        Ok(())
    }

    /// Increment and return the delivery count tracked for `message_id`,
    /// independent of the job's own `retry_count` (queue-level bookkeeping vs.
    /// the job envelope's own `RenderJob::fail` counter).
    pub async fn increment_delivery(&self, message_id: &str) -> redis::RedisResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let count: i64 = conn.hincr(RETRIES_KEY, message_id, 1).await?;
        Ok(count as u32)
    }

    /// Move a job to the dead-letter stream and ack the original message so
    /// it stops being redelivered.
    pub async fn dead_letter(&self, queued: &QueuedJob, reason: &str) -> redis::RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(&queued.job).expect("RenderJob always serializes");
        let _id: String = conn
            .xadd(DLQ_STREAM_KEY, "*", &[("payload", payload.as_str()), ("reason", reason)])
            .await?;
        self.ack(&queued.message_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_is_namespaced() {
        let key = format!("{DEDUP_PREFIX}render:job-1");
        assert_eq!(key, "vrender:queue:dedup:render:job-1");
    }
}
