//! Soft-delete and restore cascades.
//!
//! Soft deletion is a reversible visibility marker and is independent of
//! neutralization: restoring a run never brings back its personal data.

use crate::models::{Process, ProcessRun};
use chrono::{DateTime, Utc};

pub struct SoftDeleteCoordinator;

impl SoftDeleteCoordinator {
    /// Mark the run and every step-run deleted with one timestamp
    ///
    /// Returns `false` when the run was already deleted; its original
    /// timestamp is kept.
    pub fn soft_delete_run(run: &mut ProcessRun, now: DateTime<Utc>) -> bool {
        if run.is_deleted() {
            return false;
        }

        run.deleted_at = Some(now);
        run.updated_at = now;
        for step_run in &mut run.steps {
            step_run.deleted_at = Some(now);
            step_run.updated_at = now;
        }
        true
    }

    /// Clear the deletion marker on the run and every step-run
    pub fn restore_run(run: &mut ProcessRun, now: DateTime<Utc>) -> bool {
        let was_deleted = run.is_deleted() || run.steps.iter().any(|sr| sr.is_deleted());

        run.deleted_at = None;
        for step_run in &mut run.steps {
            step_run.deleted_at = None;
        }
        if was_deleted {
            run.updated_at = now;
            for step_run in &mut run.steps {
                step_run.updated_at = now;
            }
        }
        was_deleted
    }

    /// Mark the process and every step template deleted with one timestamp
    pub fn soft_delete_process(process: &mut Process, now: DateTime<Utc>) -> bool {
        if process.is_deleted() {
            return false;
        }

        process.deleted_at = Some(now);
        process.updated_at = now;
        for step in &mut process.steps {
            step.deleted_at = Some(now);
            step.updated_at = now;
        }
        true
    }

    /// Clear the deletion marker on the process and every step template
    pub fn restore_process(process: &mut Process, now: DateTime<Utc>) -> bool {
        let was_deleted =
            process.is_deleted() || process.steps.iter().any(|step| step.is_deleted());

        process.deleted_at = None;
        for step in &mut process.steps {
            step.deleted_at = None;
        }
        if was_deleted {
            process.updated_at = now;
            for step in &mut process.steps {
                step.updated_at = now;
            }
        }
        was_deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metadata, ProcessStep, ProcessStepRun, RerunConfig};
    use crate::state_machine::{RunStatus, StepRunStatus};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn run() -> ProcessRun {
        let steps = (0..2)
            .map(|i| ProcessStepRun {
                id: i + 10,
                run_id: 1,
                step_id: i + 1,
                step_index: i as i32,
                status: StepRunStatus::Success,
                started_at: None,
                finished_at: None,
                failure: None,
                can_rerun: false,
                rerun_config: RerunConfig::default(),
                rerun_count: 0,
                max_reruns: 0,
                deleted_at: None,
                created_at: t0(),
                updated_at: t0(),
            })
            .collect();

        ProcessRun {
            id: 1,
            process_id: 1,
            entity_id: "NEUTRALIZED_1".into(),
            entity_name: None,
            meta: Metadata::new(),
            status: RunStatus::Completed,
            started_at: None,
            finished_at: None,
            is_neutralized: true,
            scheduled_deletion_at: None,
            deleted_at: None,
            created_at: t0(),
            updated_at: t0(),
            steps,
        }
    }

    #[test]
    fn test_soft_delete_cascades_same_timestamp() {
        let mut r = run();
        let at = t0() + Duration::days(1);

        assert!(SoftDeleteCoordinator::soft_delete_run(&mut r, at));
        assert_eq!(r.deleted_at, Some(at));
        assert!(r.steps.iter().all(|sr| sr.deleted_at == Some(at)));

        // second delete keeps the original marker
        assert!(!SoftDeleteCoordinator::soft_delete_run(&mut r, at + Duration::days(1)));
        assert_eq!(r.deleted_at, Some(at));
    }

    #[test]
    fn test_restore_keeps_neutralization() {
        let mut r = run();
        SoftDeleteCoordinator::soft_delete_run(&mut r, t0());

        assert!(SoftDeleteCoordinator::restore_run(&mut r, t0() + Duration::hours(1)));
        assert_eq!(r.deleted_at, None);
        assert!(r.steps.iter().all(|sr| sr.deleted_at.is_none()));
        assert!(r.is_neutralized);
        assert_eq!(r.entity_id, "NEUTRALIZED_1");
    }

    #[test]
    fn test_process_cascade_to_steps() {
        let step = ProcessStep {
            id: 1,
            process_id: 1,
            index: 0,
            name: "Intake".into(),
            is_rerunnable: false,
            rerun_config: RerunConfig::default(),
            deleted_at: None,
            created_at: t0(),
            updated_at: t0(),
        };
        let mut process = Process {
            id: 1,
            name: "Benefits".into(),
            meta: serde_json::json!({}),
            retention_months: Some(6),
            deleted_at: None,
            created_at: t0(),
            updated_at: t0(),
            steps: vec![step.clone(), ProcessStep { id: 2, index: 1, ..step }],
        };

        assert!(SoftDeleteCoordinator::soft_delete_process(&mut process, t0()));
        assert!(process.steps.iter().all(|s| s.deleted_at == Some(t0())));
        assert_eq!(process.active_steps().count(), 0);

        assert!(SoftDeleteCoordinator::restore_process(&mut process, t0()));
        assert_eq!(process.active_steps().count(), 2);
        assert!(!SoftDeleteCoordinator::restore_process(&mut process, t0()));
    }
}
