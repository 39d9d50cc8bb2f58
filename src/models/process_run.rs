//! # Process Run Model
//!
//! One execution of a process against an entity (a citizen, a case).
//!
//! ## Ownership
//!
//! A run exclusively owns its step-runs, ordered by `step_index`. The run's
//! `status`, `started_at` and `finished_at` are derived from the step-runs by
//! [`RunStateMachine`](crate::state_machine::RunStateMachine) after every
//! step-run mutation and are never set directly by callers, with the single
//! exception of an externally imposed cancellation.
//!
//! ## Personal Data
//!
//! `entity_id`, `entity_name` and most of `meta` are personal data. Once the
//! run is neutralized, `entity_id` holds a placeholder derived from the run id
//! and `entity_name` is cleared.

use super::metadata::Metadata;
use super::process_step_run::{NewProcessStepRun, ProcessStepRun};
use crate::state_machine::states::{RunStatus, StepRunStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRun {
    pub id: i64,
    pub process_id: i64,
    pub entity_id: String,
    pub entity_name: Option<String>,
    pub meta: Metadata,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub is_neutralized: bool,
    pub scheduled_deletion_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Step-runs ordered by `step_index`
    pub steps: Vec<ProcessStepRun>,
}

impl ProcessRun {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn step_run(&self, step_run_id: i64) -> Option<&ProcessStepRun> {
        self.steps.iter().find(|sr| sr.id == step_run_id)
    }

    pub fn step_run_mut(&mut self, step_run_id: i64) -> Option<&mut ProcessStepRun> {
        self.steps.iter_mut().find(|sr| sr.id == step_run_id)
    }

    /// Step statuses in execution order, the input to status derivation
    pub fn step_statuses(&self) -> Vec<StepRunStatus> {
        self.steps.iter().map(|sr| sr.status).collect()
    }

    /// Whether the retention deadline has passed and the run still holds personal data
    pub fn is_due_for_neutralization(&self, now: DateTime<Utc>) -> bool {
        !self.is_neutralized
            && !self.is_deleted()
            && self
                .scheduled_deletion_at
                .is_some_and(|scheduled| scheduled <= now)
    }

    pub(crate) fn sort_steps(&mut self) {
        self.steps.sort_by_key(|sr| (sr.step_index, sr.id));
    }
}

/// Caller-supplied input for starting a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInput {
    pub entity_id: String,
    #[serde(default)]
    pub entity_name: Option<String>,
    #[serde(default)]
    pub meta: Metadata,
}

impl RunInput {
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity_name: None,
            meta: Metadata::new(),
        }
    }

    pub fn with_entity_name(mut self, name: impl Into<String>) -> Self {
        self.entity_name = Some(name.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<super::MetaValue>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// New ProcessRun with its step-runs, persisted as one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProcessRun {
    pub process_id: i64,
    pub entity_id: String,
    pub entity_name: Option<String>,
    pub meta: Metadata,
    pub status: RunStatus,
    pub scheduled_deletion_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub steps: Vec<NewProcessStepRun>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn run(scheduled: Option<DateTime<Utc>>) -> ProcessRun {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ProcessRun {
            id: 5,
            process_id: 1,
            entity_id: "0101901234".into(),
            entity_name: Some("Jane Doe".into()),
            meta: Metadata::new(),
            status: RunStatus::Pending,
            started_at: None,
            finished_at: None,
            is_neutralized: false,
            scheduled_deletion_at: scheduled,
            deleted_at: None,
            created_at: created,
            updated_at: created,
            steps: Vec::new(),
        }
    }

    #[test]
    fn test_due_requires_passed_deadline() {
        let deadline = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let r = run(Some(deadline));

        assert!(!r.is_due_for_neutralization(deadline - Duration::seconds(1)));
        assert!(r.is_due_for_neutralization(deadline));
        assert!(!run(None).is_due_for_neutralization(deadline));
    }

    #[test]
    fn test_due_excludes_neutralized_and_deleted() {
        let deadline = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();

        let mut neutralized = run(Some(deadline));
        neutralized.is_neutralized = true;
        assert!(!neutralized.is_due_for_neutralization(deadline));

        let mut deleted = run(Some(deadline));
        deleted.deleted_at = Some(deadline);
        assert!(!deleted.is_due_for_neutralization(deadline));
    }
}
