//! Progress Bus (C2) wire record and monotonic merge rule.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Coarse phase label (glossary: "Stage").
pub const STAGE_INITIALIZING: &str = "initializing";
pub const STAGE_CLIPS: &str = "clips";
pub const STAGE_COMPOSING: &str = "composing";
pub const STAGE_UPLOADING: &str = "uploading";
pub const STAGE_DONE: &str = "done";
pub const STAGE_STALE: &str = "stale";

/// A partial update to merge into a job's current `ProgressRecord`. Any field left
/// `None` is left unchanged by the merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub percent: Option<u8>,
    pub stage: Option<String>,
    pub message: Option<String>,
    pub eta_seconds: Option<u32>,
    pub done: Option<bool>,
    pub error: Option<String>,
    pub per_scene: Option<BTreeMap<u32, u8>>,
    pub scene_count: Option<u32>,
    pub current_scene: Option<u32>,
    pub warning: Option<String>,
}

impl ProgressUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn percent(mut self, percent: u8) -> Self {
        self.percent = Some(percent.min(100));
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn done(mut self) -> Self {
        self.done = Some(true);
        self.percent = Some(100);
        self.stage = Some(STAGE_DONE.to_string());
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.done = Some(false);
        self
    }

    pub fn per_scene(mut self, per_scene: BTreeMap<u32, u8>) -> Self {
        self.per_scene = Some(per_scene);
        self
    }
}

/// Durable/in-memory record for one `job_id` (§3). `per_scene` maps scene index to
/// that scene's own 0..100 progress, independent of the overall `percent` window.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProgressRecord {
    pub job_id: String,
    pub percent: u8,
    pub stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<u32>,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default)]
    pub per_scene: BTreeMap<u32, u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_scene: Option<u32>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    pub fn initial(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            percent: 0,
            stage: STAGE_INITIALIZING.to_string(),
            message: None,
            eta_seconds: None,
            done: false,
            error: None,
            warning: None,
            per_scene: BTreeMap::new(),
            scene_count: None,
            current_scene: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.done || self.error.is_some()
    }

    /// Apply `update` per the monotonicity rule (Invariant 1, §4.2):
    /// `percent := max(prev.percent, clamp(new.percent, 0, 100))` unless `stage`
    /// changed, in which case the new percent is accepted verbatim.
    pub fn merge(&mut self, update: ProgressUpdate, now: DateTime<Utc>) {
        let stage_changed = matches!(&update.stage, Some(s) if s != &self.stage);

        if let Some(new_percent) = update.percent {
            let clamped = new_percent.min(100);
            self.percent = if stage_changed {
                clamped
            } else {
                self.percent.max(clamped)
            };
        }
        if let Some(stage) = update.stage {
            self.stage = stage;
        }
        if let Some(message) = update.message {
            self.message = Some(message);
        }
        if let Some(eta) = update.eta_seconds {
            self.eta_seconds = Some(eta);
        }
        if let Some(done) = update.done {
            self.done = done;
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        if let Some(warning) = update.warning {
            self.warning = Some(warning);
        }
        if let Some(per_scene) = update.per_scene {
            self.per_scene.extend(per_scene);
        }
        if let Some(scene_count) = update.scene_count {
            self.scene_count = Some(scene_count);
        }
        if let Some(current_scene) = update.current_scene {
            self.current_scene = Some(current_scene);
        }
        self.updated_at = now;
    }

    /// Replace this record with a heartbeat/keep-alive marker that does not count
    /// as a new `publish` for monotonicity purposes (§4.2).
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after_secs: i64) -> bool {
        !self.is_terminal() && (now - self.updated_at).num_seconds() >= stale_after_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn percent_never_decreases_within_a_stage() {
        let mut record = ProgressRecord::initial("job-1");
        let t0 = Utc::now();
        record.merge(ProgressUpdate::new().stage("clips").percent(40), t0);
        assert_eq!(record.percent, 40);
        record.merge(ProgressUpdate::new().stage("clips").percent(10), t0 + Duration::seconds(1));
        assert_eq!(record.percent, 40, "percent must not regress within a stage");
    }

    #[test]
    fn stage_change_accepts_new_percent_verbatim() {
        let mut record = ProgressRecord::initial("job-1");
        let t0 = Utc::now();
        record.merge(ProgressUpdate::new().stage("clips").percent(75), t0);
        record.merge(ProgressUpdate::new().stage("composing").percent(75), t0 + Duration::seconds(1));
        assert_eq!(record.percent, 75);
        assert_eq!(record.stage, "composing");
    }

    #[test]
    fn done_update_sets_terminal_fields() {
        let mut record = ProgressRecord::initial("job-1");
        record.merge(ProgressUpdate::new().stage("clips").percent(50), Utc::now());
        record.merge(ProgressUpdate::new().done(), Utc::now());
        assert!(record.is_terminal());
        assert_eq!(record.percent, 100);
        assert_eq!(record.stage, STAGE_DONE);
    }

    #[test]
    fn error_update_is_terminal_but_not_done() {
        let mut record = ProgressRecord::initial("job-1");
        record.merge(ProgressUpdate::new().error("boom"), Utc::now());
        assert!(record.is_terminal());
        assert!(!record.done);
        assert_eq!(record.error.as_deref(), Some("boom"));
    }

    #[test]
    fn per_scene_entries_accumulate() {
        let mut record = ProgressRecord::initial("job-1");
        let mut first = BTreeMap::new();
        first.insert(0, 50);
        record.merge(ProgressUpdate::new().per_scene(first), Utc::now());
        let mut second = BTreeMap::new();
        second.insert(1, 30);
        record.merge(ProgressUpdate::new().per_scene(second), Utc::now());
        assert_eq!(record.per_scene.get(&0), Some(&50));
        assert_eq!(record.per_scene.get(&1), Some(&30));
    }

    #[test]
    fn stale_after_threshold_when_not_terminal() {
        let mut record = ProgressRecord::initial("job-1");
        record.updated_at = Utc::now() - Duration::seconds(60);
        assert!(record.is_stale(Utc::now(), 30));
        record.merge(ProgressUpdate::new().done(), Utc::now());
        assert!(!record.is_stale(Utc::now(), 30), "terminal records are never stale");
    }
}
