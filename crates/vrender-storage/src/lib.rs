//! Artifact Store Adapter (C1): the sole interface through which the rest of
//! the backend reads and writes blobs in the S3-compatible object store.

pub mod client;
pub mod error;
pub mod keys;

pub use client::{BlobStore, BlobStoreConfig, DRAFT_URL_TTL, INTERNAL_URL_TTL};
pub use error::{StorageError, StorageResult};
