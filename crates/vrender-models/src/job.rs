//! Render job envelope and the C8 state machine's stage labels.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::render_request::RenderRequest;

/// Unique identifier for a render job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// `render-{project}-{ts}` as named in §4.8's Init rule.
    pub fn derive(project_id: &str, now: DateTime<Utc>) -> Self {
        Self(format!("render-{}-{}", project_id, now.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// States of the C8 render-orchestrator state machine (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderStage {
    #[default]
    Init,
    Reserve,
    Validate,
    CacheProbe,
    ClipPhase,
    ComposePhase,
    UploadPhase,
    Publish,
    Done,
    Failed,
}

impl RenderStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStage::Init => "init",
            RenderStage::Reserve => "reserve",
            RenderStage::Validate => "validate",
            RenderStage::CacheProbe => "cache_probe",
            RenderStage::ClipPhase => "clips",
            RenderStage::ComposePhase => "composing",
            RenderStage::UploadPhase => "uploading",
            RenderStage::Publish => "publish",
            RenderStage::Done => "done",
            RenderStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RenderStage::Done | RenderStage::Failed)
    }
}

/// A render job as carried through the queue: the request plus queue bookkeeping
/// (retry count, dead-letter threshold) analogous to the originating codebase's
/// job envelope, generalized to this subsystem's single job type.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderJob {
    pub id: JobId,
    pub user_id: String,
    pub request: RenderRequest,
    #[serde(default)]
    pub stage: RenderStage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

fn default_max_retries() -> u32 {
    3
}

impl RenderJob {
    pub fn new(user_id: impl Into<String>, request: RenderRequest) -> Self {
        let now = Utc::now();
        let id = match &request.job_id {
            Some(job_id) => JobId::from_string(job_id.clone()),
            None => JobId::derive(&request.project_id, now),
        };
        Self {
            id,
            user_id: user_id.into(),
            request,
            stage: RenderStage::Init,
            created_at: now,
            updated_at: now,
            retry_count: 0,
            max_retries: default_max_retries(),
            error_message: None,
        }
    }

    pub fn advance(mut self, stage: RenderStage) -> Self {
        self.stage = stage;
        self.updated_at = Utc::now();
        self
    }

    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.stage = RenderStage::Failed;
        self.error_message = Some(error.into());
        self.updated_at = Utc::now();
        self.retry_count += 1;
        self
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries && self.stage == RenderStage::Failed
    }

    /// Queue-level idempotency key, distinct from the credit ledger's
    /// `idempotency_key` (keyed by user+operation+job) though derived from the
    /// same job id: two enqueues of the same `job_id` must dedupe (P7).
    pub fn dedup_key(&self) -> String {
        format!("render:{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::UserTier;

    fn request(job_id: Option<&str>) -> RenderRequest {
        RenderRequest {
            project_id: "proj-1".into(),
            scenes: vec![],
            audio_ref: "narration.mp3".into(),
            subtitles_ref: None,
            music_ref: None,
            target_width: 854,
            target_height: 480,
            export_preset: crate::render_request::ExportPreset::Youtube,
            job_id: job_id.map(|s| s.to_string()),
            force: false,
            published: false,
            user_tier: UserTier::Free,
            no_subtitles: false,
        }
    }

    #[test]
    fn job_id_is_derived_when_not_supplied() {
        let job = RenderJob::new("user-1", request(None));
        assert!(job.id.as_str().starts_with("render-proj-1-"));
    }

    #[test]
    fn job_id_honors_supplied_value_for_idempotent_redrive() {
        let job = RenderJob::new("user-1", request(Some("my-job")));
        assert_eq!(job.id.as_str(), "my-job");
    }

    #[test]
    fn fail_increments_retry_count_and_marks_stage() {
        let job = RenderJob::new("user-1", request(Some("j1")));
        let failed = job.fail("boom");
        assert_eq!(failed.stage, RenderStage::Failed);
        assert!(failed.can_retry());
        assert_eq!(failed.retry_count, 1);
    }

    #[test]
    fn terminal_stages() {
        assert!(RenderStage::Done.is_terminal());
        assert!(RenderStage::Failed.is_terminal());
        assert!(!RenderStage::ClipPhase.is_terminal());
    }
}
