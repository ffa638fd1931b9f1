//! Integration tests for the render-orchestration backend.
//!
//! These tests require external services (Redis, a Firestore-flavored
//! document store, and an S3-compatible blob store) to be available.
//! Run with: `cargo test --test integration -- --ignored`

pub mod api_tests;
pub mod firestore_tests;
pub mod redis_tests;
pub mod storage_tests;
