//! # Process Step Run Model
//!
//! Per-run execution record of a single step template.
//!
//! Step-runs are created together with their run, one per active template
//! step, and copy the template's index and rerun configuration at that
//! moment. A step-run holds its run's id for lookup only; the run owns it.

use super::process::{ProcessStep, RerunConfig};
use crate::state_machine::states::StepRunStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStepRun {
    pub id: i64,
    pub run_id: i64,
    pub step_id: i64,
    pub step_index: i32,
    pub status: StepRunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Structured error payload for failed steps or failed rerun triggers
    pub failure: Option<Value>,
    pub can_rerun: bool,
    pub rerun_config: RerunConfig,
    pub rerun_count: u32,
    pub max_reruns: u32,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessStepRun {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn reruns_remaining(&self) -> u32 {
        self.max_reruns.saturating_sub(self.rerun_count)
    }

    pub fn has_exceeded_rerun_limit(&self) -> bool {
        self.rerun_count >= self.max_reruns
    }

    /// Apply a partial update, stamping missing step timestamps on transitions
    pub fn apply_patch(&mut self, patch: StepRunPatch, now: DateTime<Utc>) {
        let previous = self.status;

        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(started_at) = patch.started_at {
            self.started_at = started_at;
        }
        if let Some(finished_at) = patch.finished_at {
            self.finished_at = finished_at;
        }
        if let Some(failure) = patch.failure {
            self.failure = failure;
        }

        if previous != self.status {
            if self.status == StepRunStatus::Running && self.started_at.is_none() {
                self.started_at = Some(now);
            }
            if self.status.is_terminal() && self.finished_at.is_none() {
                self.finished_at = Some(now);
            }
        }

        self.updated_at = now;
    }
}

/// New ProcessStepRun for creation, built from a step template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProcessStepRun {
    pub step_id: i64,
    pub step_index: i32,
    pub can_rerun: bool,
    pub rerun_config: RerunConfig,
    pub max_reruns: u32,
}

impl NewProcessStepRun {
    /// Snapshot a template's index and rerun settings
    ///
    /// Non-rerunnable templates yield an empty config and zero allowed reruns.
    pub fn from_template(step: &ProcessStep, default_max_reruns: u32) -> Self {
        let (rerun_config, max_reruns) = if step.is_rerunnable {
            (
                step.rerun_config.clone(),
                step.rerun_config.max_retries.unwrap_or(default_max_reruns),
            )
        } else {
            (RerunConfig::default(), 0)
        };

        Self {
            step_id: step.id,
            step_index: step.index,
            can_rerun: step.is_rerunnable,
            rerun_config,
            max_reruns,
        }
    }
}

/// Partial update of a step-run
///
/// Nested options distinguish "leave as is" (`None`) from "clear"
/// (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepRunPatch {
    #[serde(default)]
    pub status: Option<StepRunStatus>,
    #[serde(default, with = "double_option")]
    pub started_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, with = "double_option")]
    pub finished_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, with = "double_option")]
    pub failure: Option<Option<Value>>,
}

impl StepRunPatch {
    pub fn status(status: StepRunStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn failed_with(failure: Value) -> Self {
        Self {
            status: Some(StepRunStatus::Failed),
            failure: Some(Some(failure)),
            ..Self::default()
        }
    }
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn template(is_rerunnable: bool, rerun_config: RerunConfig) -> ProcessStep {
        let now = Utc::now();
        ProcessStep {
            id: 11,
            process_id: 1,
            index: 2,
            name: "Send letter".into(),
            is_rerunnable,
            rerun_config,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn step_run() -> ProcessStepRun {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ProcessStepRun {
            id: 1,
            run_id: 1,
            step_id: 11,
            step_index: 0,
            status: StepRunStatus::Pending,
            started_at: None,
            finished_at: None,
            failure: None,
            can_rerun: false,
            rerun_config: RerunConfig::default(),
            rerun_count: 0,
            max_reruns: 0,
            deleted_at: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_from_template_copies_rerun_settings() {
        let config = RerunConfig::with_max_retries(5);
        let new_step_run = NewProcessStepRun::from_template(&template(true, config.clone()), 3);

        assert_eq!(new_step_run.step_index, 2);
        assert!(new_step_run.can_rerun);
        assert_eq!(new_step_run.max_reruns, 5);
        assert_eq!(new_step_run.rerun_config, config);
    }

    #[test]
    fn test_from_template_defaults_max_reruns() {
        let new_step_run =
            NewProcessStepRun::from_template(&template(true, RerunConfig::default()), 3);
        assert_eq!(new_step_run.max_reruns, 3);
    }

    #[test]
    fn test_from_template_non_rerunnable_drops_config() {
        let new_step_run =
            NewProcessStepRun::from_template(&template(false, RerunConfig::with_max_retries(9)), 3);
        assert!(!new_step_run.can_rerun);
        assert_eq!(new_step_run.max_reruns, 0);
        assert!(new_step_run.rerun_config.is_empty());
    }

    #[test]
    fn test_apply_patch_stamps_missing_timestamps() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();
        let mut sr = step_run();

        sr.apply_patch(StepRunPatch::status(StepRunStatus::Running), now);
        assert_eq!(sr.started_at, Some(now));
        assert_eq!(sr.finished_at, None);

        let later = now + chrono::Duration::minutes(5);
        sr.apply_patch(StepRunPatch::status(StepRunStatus::Success), later);
        assert_eq!(sr.started_at, Some(now));
        assert_eq!(sr.finished_at, Some(later));
    }

    #[test]
    fn test_apply_patch_respects_explicit_values() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();
        let explicit = Utc.with_ymd_and_hms(2024, 1, 2, 7, 0, 0).unwrap();
        let mut sr = step_run();

        sr.apply_patch(
            StepRunPatch {
                status: Some(StepRunStatus::Failed),
                started_at: Some(Some(explicit)),
                finished_at: Some(Some(explicit)),
                failure: Some(Some(json!({"message": "timeout"}))),
            },
            now,
        );

        assert_eq!(sr.started_at, Some(explicit));
        assert_eq!(sr.finished_at, Some(explicit));
        assert_eq!(sr.failure, Some(json!({"message": "timeout"})));
    }

    #[test]
    fn test_patch_deserializes_explicit_null_as_clear() {
        let patch: StepRunPatch =
            serde_json::from_value(json!({"status": "pending", "failure": null})).unwrap();
        assert_eq!(patch.status, Some(StepRunStatus::Pending));
        assert_eq!(patch.failure, Some(None));
        assert_eq!(patch.started_at, None);
    }
}
