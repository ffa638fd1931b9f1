//! Best-effort, append-only audit trail for credit reservation transitions.
//!
//! Writing the audit row is never allowed to block or fail the caller's credit
//! operation: every write is fired via `tokio::spawn` with a bounded timeout,
//! and a failure here only produces a warning log.

use std::collections::HashMap;
use std::time::Duration;

use tracing::warn;
use vrender_models::CreditTransaction;

use crate::client::FirestoreClient;
use crate::types::{ToFirestoreValue, Value};

const AUDIT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct AuditLog {
    client: FirestoreClient,
}

impl AuditLog {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Record `tx` best-effort. Returns immediately; the write happens in the
    /// background.
    pub fn record(&self, tx: CreditTransaction) {
        let client = self.client.clone();
        tokio::spawn(async move {
            let collection = format!("users/{}/credit_transactions", tx.user_id);
            let fields = transaction_to_fields(&tx);
            let write = client.create_document(&collection, &tx.id, fields);
            match tokio::time::timeout(AUDIT_WRITE_TIMEOUT, write).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(tx_id = %tx.id, error = %e, "credit audit write failed"),
                Err(_) => warn!(tx_id = %tx.id, "credit audit write timed out"),
            }
        });
    }
}

fn transaction_to_fields(tx: &CreditTransaction) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("user_id".to_string(), tx.user_id.to_firestore_value());
    fields.insert("timestamp".to_string(), tx.timestamp.to_firestore_value());
    fields.insert(
        "operation".to_string(),
        tx.operation.as_str().to_firestore_value(),
    );
    fields.insert(
        "credits_amount".to_string(),
        tx.credits_amount.to_firestore_value(),
    );
    fields.insert("description".to_string(), tx.description.to_firestore_value());
    if let Some(job_id) = &tx.job_id {
        fields.insert("job_id".to_string(), job_id.to_firestore_value());
    }
    fields
}
