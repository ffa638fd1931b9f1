//! Credit Ledger Client (C3): reserve/settle/refund credits against a
//! Firestore-backed user-credits store over the raw REST API.
//!
//! ## Modules
//! - `client` - Firestore REST API client (documents, precondition updates, batch writes)
//! - `ledger` - reserve/settle/refund state machine over `credit_reservations`
//! - `audit` - best-effort append-only transaction logging
//! - `token_cache` - thread-safe access token caching
//! - `retry` - retry policy with exponential backoff
//! - `metrics` - Prometheus metrics collection
//! - `types` - Firestore document types and value conversions

pub mod audit;
pub mod client;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;

pub use audit::AuditLog;
pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use ledger::CreditLedger;
pub use retry::RetryConfig;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
