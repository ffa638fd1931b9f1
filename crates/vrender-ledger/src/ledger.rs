//! Credit reservation state machine: reserve, settle, refund against the
//! Firestore-backed user-credits document, plus the `credit_reservations`
//! collection that makes the whole dance idempotent under redrive.

use std::collections::HashMap;

use chrono::Utc;
use tracing::warn;
use vrender_models::credit::{idempotency_key, CreditOperation, CreditReservation, ReservationState};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::retry::{with_retry, RetryConfig};
use crate::types::{FromFirestoreValue, ToFirestoreValue};

const USERS_COLLECTION: &str = "users";
const RESERVATIONS_COLLECTION: &str = "credit_reservations";
const MAX_CREDIT_RETRIES: u32 = 5;
const RETRY_BASE_DELAY_MS: u64 = 50;

/// Transient-failure policy for the underlying Firestore HTTP calls (§4.3):
/// network errors, 429s, and 5xxs are retried here, independent of the
/// optimistic-lock contention loops in `reserve`/`credit_back` below.
const TRANSIENT_RETRY: RetryConfig = RetryConfig { max_retries: 3, base_delay_ms: 1000, max_delay_ms: 8000 };

pub struct CreditLedger {
    client: FirestoreClient,
}

impl CreditLedger {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Underlying Firestore client, for connectivity checks that don't belong
    /// to the reserve/settle/refund state machine (e.g. API readiness probes).
    pub fn client(&self) -> &FirestoreClient {
        &self.client
    }

    /// Reserve `credits` for `job_id` against `user_id`'s balance.
    ///
    /// Idempotent: a retry with the same `(user_id, operation, job_id)` returns
    /// the reservation already on file instead of double-charging. Fails with
    /// `InsufficientCredits` if the user's current balance can't cover the
    /// request; the reservation document is only written once the balance
    /// update has gone through.
    pub async fn reserve(
        &self,
        user_id: &str,
        job_id: &str,
        operation: CreditOperation,
        credits: u32,
    ) -> FirestoreResult<CreditReservation> {
        let key = idempotency_key(user_id, operation, job_id);

        if let Some(existing) = self.get_reservation(&key).await? {
            return Ok(existing);
        }

        let mut attempt = 0;
        loop {
            let doc = with_retry(&TRANSIENT_RETRY, "reserve.get_user", || self.client.get_document(USERS_COLLECTION, user_id))
                .await?
                .ok_or_else(|| FirestoreError::not_found(format!("{USERS_COLLECTION}/{user_id}")))?;

            let fields = doc.fields.unwrap_or_default();
            let available = fields
                .get("credits_available")
                .and_then(u32::from_firestore_value)
                .unwrap_or(0);

            if available < credits {
                return Err(FirestoreError::InsufficientCredits {
                    required: credits,
                    available,
                });
            }

            let mut update = HashMap::new();
            update.insert(
                "credits_available".to_string(),
                (available - credits).to_firestore_value(),
            );

            let result = with_retry(&TRANSIENT_RETRY, "reserve.debit_user", || {
                self.client.update_document_with_precondition(
                    USERS_COLLECTION,
                    user_id,
                    update.clone(),
                    Some(vec!["credits_available".to_string()]),
                    doc.update_time.as_deref(),
                )
            })
            .await;

            match result {
                Ok(_) => break,
                Err(e) if e.is_precondition_failed() && attempt < MAX_CREDIT_RETRIES => {
                    attempt += 1;
                    let delay = RETRY_BASE_DELAY_MS * attempt as u64;
                    warn!(user_id, job_id, attempt, "credit reservation contended, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                }
                Err(e) => return Err(e),
            }
        }

        let reservation = CreditReservation::new(key.clone(), user_id, job_id, operation, credits);
        self.put_reservation(&reservation).await?;
        Ok(reservation)
    }

    /// Mark a reservation completed. The reserved credits were already debited
    /// at `reserve` time, so this only flips state.
    pub async fn settle(&self, reservation: &CreditReservation) -> FirestoreResult<CreditReservation> {
        self.transition(reservation, ReservationState::Completed, None).await
    }

    /// Mark a reservation failed and return its credits to the user's balance.
    pub async fn fail(
        &self,
        reservation: &CreditReservation,
        reason: impl Into<String>,
    ) -> FirestoreResult<CreditReservation> {
        self.credit_back(reservation).await?;
        self.transition(reservation, ReservationState::Failed, Some(reason.into()))
            .await
    }

    /// Refund a completed reservation's credits back to the user and mark it
    /// `Refunded`. Only valid from `Completed` (see `CreditReservation::can_refund`).
    pub async fn refund(&self, reservation: &CreditReservation) -> FirestoreResult<CreditReservation> {
        if !reservation.can_refund() {
            return Err(FirestoreError::request_failed(format!(
                "reservation {} cannot be refunded from state {:?}",
                reservation.idempotency_key, reservation.state
            )));
        }
        self.credit_back(reservation).await?;
        self.transition(reservation, ReservationState::Refunded, None).await
    }

    async fn credit_back(&self, reservation: &CreditReservation) -> FirestoreResult<()> {
        let mut attempt = 0;
        loop {
            let doc = with_retry(&TRANSIENT_RETRY, "credit_back.get_user", || {
                self.client.get_document(USERS_COLLECTION, &reservation.user_id)
            })
            .await?
            .ok_or_else(|| FirestoreError::not_found(format!("{USERS_COLLECTION}/{}", reservation.user_id)))?;

            let fields = doc.fields.unwrap_or_default();
            let available = fields
                .get("credits_available")
                .and_then(u32::from_firestore_value)
                .unwrap_or(0);

            let mut update = HashMap::new();
            update.insert(
                "credits_available".to_string(),
                (available + reservation.credits_reserved).to_firestore_value(),
            );

            let result = with_retry(&TRANSIENT_RETRY, "credit_back.credit_user", || {
                self.client.update_document_with_precondition(
                    USERS_COLLECTION,
                    &reservation.user_id,
                    update.clone(),
                    Some(vec!["credits_available".to_string()]),
                    doc.update_time.as_deref(),
                )
            })
            .await;

            match result {
                Ok(_) => return Ok(()),
                Err(e) if e.is_precondition_failed() && attempt < MAX_CREDIT_RETRIES => {
                    attempt += 1;
                    tokio::time::sleep(std::time::Duration::from_millis(RETRY_BASE_DELAY_MS * attempt as u64)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn transition(
        &self,
        reservation: &CreditReservation,
        state: ReservationState,
        failure_reason: Option<String>,
    ) -> FirestoreResult<CreditReservation> {
        let mut updated = reservation.clone();
        updated.state = state;
        updated.updated_at = Utc::now();
        updated.failure_reason = failure_reason;

        let mut fields = HashMap::new();
        fields.insert("state".to_string(), state_str(state).to_firestore_value());
        fields.insert("updated_at".to_string(), updated.updated_at.to_firestore_value());
        if let Some(reason) = &updated.failure_reason {
            fields.insert("failure_reason".to_string(), reason.to_firestore_value());
        }

        with_retry(&TRANSIENT_RETRY, "transition.update_reservation", || {
            self.client
                .update_document(RESERVATIONS_COLLECTION, &reservation.idempotency_key, fields.clone(), None)
        })
        .await?;

        Ok(updated)
    }

    async fn get_reservation(&self, key: &str) -> FirestoreResult<Option<CreditReservation>> {
        let doc = match with_retry(&TRANSIENT_RETRY, "get_reservation", || self.client.get_document(RESERVATIONS_COLLECTION, key)).await? {
            Some(d) => d,
            None => return Ok(None),
        };
        let fields = doc.fields.unwrap_or_default();
        Ok(Some(CreditReservation {
            idempotency_key: key.to_string(),
            user_id: fields.get("user_id").and_then(String::from_firestore_value).unwrap_or_default(),
            job_id: fields.get("job_id").and_then(String::from_firestore_value).unwrap_or_default(),
            operation: CreditOperation::VideoRender,
            credits_reserved: fields
                .get("credits_reserved")
                .and_then(u32::from_firestore_value)
                .unwrap_or(0),
            state: fields
                .get("state")
                .and_then(String::from_firestore_value)
                .as_deref()
                .map(state_from_str)
                .unwrap_or(ReservationState::Reserved),
            created_at: fields
                .get("created_at")
                .and_then(chrono::DateTime::<Utc>::from_firestore_value)
                .unwrap_or_else(Utc::now),
            updated_at: fields
                .get("updated_at")
                .and_then(chrono::DateTime::<Utc>::from_firestore_value)
                .unwrap_or_else(Utc::now),
            failure_reason: fields.get("failure_reason").and_then(String::from_firestore_value),
        }))
    }

    async fn put_reservation(&self, reservation: &CreditReservation) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("user_id".to_string(), reservation.user_id.to_firestore_value());
        fields.insert("job_id".to_string(), reservation.job_id.to_firestore_value());
        fields.insert(
            "operation".to_string(),
            reservation.operation.as_str().to_firestore_value(),
        );
        fields.insert(
            "credits_reserved".to_string(),
            reservation.credits_reserved.to_firestore_value(),
        );
        fields.insert("state".to_string(), state_str(reservation.state).to_firestore_value());
        fields.insert("created_at".to_string(), reservation.created_at.to_firestore_value());
        fields.insert("updated_at".to_string(), reservation.updated_at.to_firestore_value());

        with_retry(&TRANSIENT_RETRY, "put_reservation", || {
            self.client.create_document(RESERVATIONS_COLLECTION, &reservation.idempotency_key, fields.clone())
        })
        .await?;
        Ok(())
    }
}

fn state_str(state: ReservationState) -> &'static str {
    match state {
        ReservationState::Reserved => "reserved",
        ReservationState::Completed => "completed",
        ReservationState::Failed => "failed",
        ReservationState::Refunded => "refunded",
    }
}

fn state_from_str(s: &str) -> ReservationState {
    match s {
        "completed" => ReservationState::Completed,
        "failed" => ReservationState::Failed,
        "refunded" => ReservationState::Refunded,
        _ => ReservationState::Reserved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_str() {
        for state in [
            ReservationState::Reserved,
            ReservationState::Completed,
            ReservationState::Failed,
            ReservationState::Refunded,
        ] {
            assert_eq!(state_from_str(state_str(state)), state);
        }
    }
}
