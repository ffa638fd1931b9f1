//! Clip Generator (C5): converts one scene's image into a short motion clip
//! via a queue-based external provider, with per-scene caching and a
//! tier-aware model fallback chain.

pub mod clipgen;
pub mod error;
pub mod provider;

pub use clipgen::{ClipGenConfig, ClipGenerator, SceneClip};
pub use error::{ClipGenError, ClipGenResult};
pub use provider::{ModelEndpoint, ProviderClient};
