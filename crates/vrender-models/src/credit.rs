//! Credit Ledger Client (C3) data model: reservations, settlement states, and the
//! audit-trail transaction shape.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Operation a credit reservation is held against. `VideoRender` is the only
/// operation this subsystem issues; the others mirror transaction types an audit
/// trail shared with sibling services would also record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum CreditOperation {
    VideoRender,
    ClipRegenerate,
    AdminAdjustment,
}

impl CreditOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditOperation::VideoRender => "videoRender",
            CreditOperation::ClipRegenerate => "clipRegenerate",
            CreditOperation::AdminAdjustment => "adminAdjustment",
        }
    }
}

/// Derive the idempotency key `hash(user_id|operation|job_id)` (§4.3).
pub fn idempotency_key(user_id: &str, operation: CreditOperation, job_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b"|");
    hasher.update(operation.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(job_id.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Lifecycle state of a `CreditReservation` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReservationState {
    Reserved,
    Completed,
    Failed,
    Refunded,
}

/// Durable row keyed by `idempotency_key`. Outlives the render for audit (§3).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreditReservation {
    pub idempotency_key: String,
    pub user_id: String,
    pub job_id: String,
    pub operation: CreditOperation,
    pub credits_reserved: u32,
    pub state: ReservationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl CreditReservation {
    pub fn new(
        idempotency_key: impl Into<String>,
        user_id: impl Into<String>,
        job_id: impl Into<String>,
        operation: CreditOperation,
        credits_reserved: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            idempotency_key: idempotency_key.into(),
            user_id: user_id.into(),
            job_id: job_id.into(),
            operation,
            credits_reserved,
            state: ReservationState::Reserved,
            created_at: now,
            updated_at: now,
            failure_reason: None,
        }
    }

    pub fn can_refund(&self) -> bool {
        self.state == ReservationState::Completed
    }
}

/// Append-only audit row recorded best-effort alongside every reservation state
/// transition (mirrors the originating codebase's transaction-log shape).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreditTransaction {
    pub id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub operation: CreditOperation,
    pub credits_amount: i64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl CreditTransaction {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        operation: CreditOperation,
        credits_amount: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            timestamp: Utc::now(),
            operation,
            credits_amount,
            description: description.into(),
            job_id: None,
            metadata: None,
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_deterministic() {
        let a = idempotency_key("user-1", CreditOperation::VideoRender, "job-1");
        let b = idempotency_key("user-1", CreditOperation::VideoRender, "job-1");
        assert_eq!(a, b);
    }

    #[test]
    fn idempotency_key_differs_per_job() {
        let a = idempotency_key("user-1", CreditOperation::VideoRender, "job-1");
        let b = idempotency_key("user-1", CreditOperation::VideoRender, "job-2");
        assert_ne!(a, b);
    }

    #[test]
    fn only_completed_reservations_can_refund() {
        let mut r = CreditReservation::new("k", "u", "j", CreditOperation::VideoRender, 3);
        assert!(!r.can_refund());
        r.state = ReservationState::Completed;
        assert!(r.can_refund());
        r.state = ReservationState::Refunded;
        assert!(!r.can_refund());
    }
}
