//! Shared data model for the render-orchestration backend.
//!
//! Covers the types in §3 of the design: scenes and render requests, the
//! cache-key manifest (C4), credit reservations (C3), progress records (C2),
//! and the render job envelope driving the orchestrator's state machine (C8).

pub mod credit;
pub mod job;
pub mod manifest;
pub mod plan;
pub mod progress;
pub mod render_request;
pub mod retry;
pub mod scene;

pub use credit::{
    idempotency_key, CreditOperation, CreditReservation, CreditTransaction, ReservationState,
};
pub use job::{JobId, RenderJob, RenderStage};
pub use manifest::{Manifest, ManifestInputs, ManifestScene};
pub use plan::{video_render_rate, PlanVariant, TierLimits, UserTier};
pub use progress::{
    ProgressRecord, ProgressUpdate, STAGE_CLIPS, STAGE_COMPOSING, STAGE_DONE, STAGE_INITIALIZING,
    STAGE_STALE, STAGE_UPLOADING,
};
pub use render_request::{BlobPath, ExportPreset, RenderRequest};
pub use retry::{retry_async, BackoffConfig};
pub use scene::{AspectRatio, Camera, Scene, SceneQuality, Transition};
