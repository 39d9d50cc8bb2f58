//! # Process Run Service
//!
//! Entry points for run lifecycle operations. Every operation loads the whole
//! run aggregate, mutates it in memory, re-derives the run status where step
//! statuses may have changed, and writes the aggregate back in one repository
//! call. The rerun trigger is the only external call and happens after the
//! reset step-run has been committed.

use crate::adapters::{RerunAdapter, RerunParams, RerunResult};
use crate::constants::{events, DEFAULT_MAX_RERUNS, RERUN_TRIGGER_FAILURE_TYPE};
use crate::error::{ResourceKind, Result, RunLedgerError};
use crate::logging::{log_run_operation, log_step_run_operation};
use crate::models::{
    NewProcessRun, NewProcessStepRun, ProcessRun, ProcessStepRun, RunInput, StepRunPatch,
};
use crate::persistence::RunRepository;
use crate::retention::{scheduled_deletion_for, SoftDeleteCoordinator};
use crate::state_machine::{RerunPolicy, RunStateMachine, RunStatus, StepRunStatus};
use crate::utils::Clock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of an accepted rerun request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerunOutcome {
    pub step_run: ProcessStepRun,
    pub run_status: RunStatus,
    pub trigger_result: RerunResult,
    pub trigger_message: Option<String>,
    pub adapter: String,
}

#[derive(Clone)]
pub struct ProcessRunService {
    repository: Arc<dyn RunRepository>,
    adapter: Arc<dyn RerunAdapter>,
    clock: Arc<dyn Clock>,
    policy: Arc<RerunPolicy>,
    default_max_reruns: u32,
}

impl ProcessRunService {
    pub fn new(
        repository: Arc<dyn RunRepository>,
        adapter: Arc<dyn RerunAdapter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            adapter,
            clock,
            policy: Arc::new(RerunPolicy::new()),
            default_max_reruns: DEFAULT_MAX_RERUNS,
        }
    }

    pub fn with_default_max_reruns(mut self, default_max_reruns: u32) -> Self {
        self.default_max_reruns = default_max_reruns;
        self
    }

    pub fn with_policy(mut self, policy: RerunPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Create a run and one step-run per active step template
    ///
    /// Step index and rerun settings are copied from the templates, and the
    /// retention deadline is fixed from the process policy at this moment.
    pub async fn create_run_with_steps(&self, process_id: i64, input: RunInput) -> Result<ProcessRun> {
        if input.entity_id.trim().is_empty() {
            return Err(RunLedgerError::validation("entity_id must not be empty"));
        }

        let process = self
            .repository
            .find_process(process_id, false)
            .await?
            .ok_or_else(|| RunLedgerError::not_found(ResourceKind::Process, process_id))?;

        let now = self.clock.now();
        let steps: Vec<NewProcessStepRun> = process
            .active_steps()
            .map(|step| NewProcessStepRun::from_template(step, self.default_max_reruns))
            .collect();
        let initial_statuses = vec![StepRunStatus::Pending; steps.len()];

        let new_run = NewProcessRun {
            process_id,
            entity_id: input.entity_id,
            entity_name: input.entity_name,
            meta: input.meta,
            status: RunStateMachine::derive_status(RunStatus::Pending, &initial_statuses),
            scheduled_deletion_at: scheduled_deletion_for(&process, now),
            created_at: now,
            steps,
        };

        let run = self.repository.insert_run(new_run).await?;

        log_run_operation(
            events::RUN_CREATED,
            Some(run.id),
            Some(process_id),
            run.status.as_str(),
            None,
        );
        debug!(
            run_id = run.id,
            step_runs = run.steps.len(),
            scheduled_deletion_at = ?run.scheduled_deletion_at,
            "Run created from process templates"
        );
        Ok(run)
    }

    /// Load a run, treating a soft-deleted one as absent unless asked
    pub async fn get_run(&self, run_id: i64, include_deleted: bool) -> Result<ProcessRun> {
        self.repository
            .find_run(run_id, include_deleted)
            .await?
            .ok_or_else(|| RunLedgerError::not_found(ResourceKind::ProcessRun, run_id))
    }

    /// Load the live run owning a live step-run
    async fn load_owning_run(&self, step_run_id: i64) -> Result<ProcessRun> {
        let not_found = || RunLedgerError::not_found(ResourceKind::ProcessStepRun, step_run_id);

        let run_id = self
            .repository
            .find_run_id_for_step_run(step_run_id)
            .await?
            .ok_or_else(not_found)?;
        let run = self
            .repository
            .find_run(run_id, false)
            .await?
            .ok_or_else(not_found)?;

        match run.step_run(step_run_id) {
            Some(step_run) if !step_run.is_deleted() => Ok(run),
            _ => Err(not_found()),
        }
    }

    pub async fn get_step_run(&self, step_run_id: i64) -> Result<ProcessStepRun> {
        let run = self.load_owning_run(step_run_id).await?;
        run.step_run(step_run_id)
            .cloned()
            .ok_or_else(|| RunLedgerError::not_found(ResourceKind::ProcessStepRun, step_run_id))
    }

    /// Apply a partial update to a step-run and re-derive its run
    pub async fn apply_step_run_update(
        &self,
        step_run_id: i64,
        patch: StepRunPatch,
    ) -> Result<ProcessStepRun> {
        let mut run = self.load_owning_run(step_run_id).await?;
        let now = self.clock.now();

        let step_run = run
            .step_run_mut(step_run_id)
            .ok_or_else(|| RunLedgerError::not_found(ResourceKind::ProcessStepRun, step_run_id))?;
        step_run.apply_patch(patch, now);
        let updated = step_run.clone();

        let outcome = RunStateMachine::apply(&mut run, now);
        self.repository.save_run(&run).await?;

        log_step_run_operation(
            events::STEP_RUN_UPDATED,
            Some(run.id),
            Some(step_run_id),
            updated.status.as_str(),
            None,
        );
        if outcome.status_changed() {
            log_run_operation(
                events::RUN_STATUS_CHANGED,
                Some(run.id),
                Some(run.process_id),
                outcome.status.as_str(),
                Some(outcome.previous.as_str()),
            );
        }

        Ok(updated)
    }

    /// Impose cancellation on a run; later step updates cannot undo it
    pub async fn cancel_run(&self, run_id: i64) -> Result<ProcessRun> {
        let mut run = self.get_run(run_id, false).await?;

        let outcome = RunStateMachine::cancel(&mut run, self.clock.now());
        if outcome.has_side_effects() {
            self.repository.save_run(&run).await?;
            log_run_operation(
                events::RUN_STATUS_CHANGED,
                Some(run_id),
                Some(run.process_id),
                outcome.status.as_str(),
                Some(outcome.previous.as_str()),
            );
        }
        Ok(run)
    }

    /// Reset a failed step-run and hand it to the rerun adapter
    ///
    /// The reset and re-derived run are committed before the adapter is
    /// called. A non-success trigger result is recorded on the step-run's
    /// `failure` and committed again; it is not returned as an error.
    pub async fn rerun_step(&self, step_run_id: i64) -> Result<RerunOutcome> {
        let mut run = self.load_owning_run(step_run_id).await?;
        let run_id = run.id;
        let now = self.clock.now();

        let step_run = run
            .step_run_mut(step_run_id)
            .ok_or_else(|| RunLedgerError::not_found(ResourceKind::ProcessStepRun, step_run_id))?;
        if let Err(denied) = self.policy.attempt_rerun(step_run, now) {
            warn!(
                event = events::STEP_RUN_RERUN_DENIED,
                step_run_id = step_run_id,
                reason = denied.code(),
                "Rerun denied"
            );
            return Err(denied.into());
        }
        let params = RerunParams {
            step_run_id,
            run_id,
            config: step_run.rerun_config.clone(),
        };
        let rerun_count = step_run.rerun_count;

        RunStateMachine::apply(&mut run, now);
        self.repository.save_run(&run).await?;

        info!(
            event = events::STEP_RUN_RERUN_REQUESTED,
            run_id = run_id,
            step_run_id = step_run_id,
            rerun_count = rerun_count,
            run_status = %run.status,
            "Step run reset for rerun"
        );

        let (trigger_result, trigger_message) =
            self.adapter.trigger_rerun(step_run_id, &params).await;
        let adapter = self.adapter.adapter_name();

        if !trigger_result.is_success() {
            let recorded_at = self.clock.now();
            if let Some(step_run) = run.step_run_mut(step_run_id) {
                step_run.failure = Some(json!({
                    "type": RERUN_TRIGGER_FAILURE_TYPE,
                    "result": trigger_result.as_str(),
                    "message": trigger_message,
                    "adapter": adapter,
                }));
                step_run.updated_at = recorded_at;
            }
            RunStateMachine::apply(&mut run, recorded_at);
            self.repository.save_run(&run).await?;

            warn!(
                event = events::STEP_RUN_RERUN_TRIGGER_FAILED,
                step_run_id = step_run_id,
                adapter = adapter,
                result = %trigger_result,
                message = ?trigger_message,
                "Rerun trigger did not succeed; recorded on step run"
            );
        }

        let step_run = run
            .step_run(step_run_id)
            .cloned()
            .ok_or_else(|| RunLedgerError::not_found(ResourceKind::ProcessStepRun, step_run_id))?;

        Ok(RerunOutcome {
            step_run,
            run_status: run.status,
            trigger_result,
            trigger_message,
            adapter: adapter.to_string(),
        })
    }

    /// Whether a rerun would currently be accepted and the adapter supports it
    ///
    /// A missing or deleted step-run answers `false` rather than an error.
    pub async fn can_rerun(&self, step_run_id: i64) -> Result<bool> {
        let run = match self.load_owning_run(step_run_id).await {
            Ok(run) => run,
            Err(err) if err.is_not_found() => return Ok(false),
            Err(err) => return Err(err),
        };

        let allowed = run
            .step_run(step_run_id)
            .is_some_and(|step_run| self.policy.can_rerun(step_run));
        Ok(allowed && self.adapter.can_rerun(step_run_id).await)
    }

    /// Failed step-runs of a run that the policy would rerun, in step order
    pub async fn list_rerunnable_step_runs(&self, run_id: i64) -> Result<Vec<ProcessStepRun>> {
        let run = self.get_run(run_id, false).await?;
        Ok(run
            .steps
            .into_iter()
            .filter(|step_run| !step_run.is_deleted() && self.policy.can_rerun(step_run))
            .collect())
    }

    pub async fn soft_delete_run(&self, run_id: i64) -> Result<ProcessRun> {
        let mut run = self.get_run(run_id, true).await?;

        if SoftDeleteCoordinator::soft_delete_run(&mut run, self.clock.now()) {
            self.repository.save_run(&run).await?;
            log_run_operation(
                events::RUN_SOFT_DELETED,
                Some(run_id),
                Some(run.process_id),
                run.status.as_str(),
                None,
            );
        }
        Ok(run)
    }

    /// Bring back a soft-deleted run; neutralization is never undone
    pub async fn restore_run(&self, run_id: i64) -> Result<ProcessRun> {
        let mut run = self.get_run(run_id, true).await?;

        if SoftDeleteCoordinator::restore_run(&mut run, self.clock.now()) {
            self.repository.save_run(&run).await?;
            log_run_operation(
                events::RUN_RESTORED,
                Some(run_id),
                Some(run.process_id),
                run.status.as_str(),
                None,
            );
        }
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{DisabledRerunAdapter, ManualRerunAdapter};
    use crate::models::{NewProcess, NewProcessStep, RerunConfig};
    use crate::persistence::InMemoryRunRepository;
    use crate::services::ProcessService;
    use crate::utils::FixedClock;
    use chrono::{Duration, TimeZone, Utc};

    struct Harness {
        repository: Arc<dyn RunRepository>,
        runs: ProcessRunService,
        processes: ProcessService,
        clock: Arc<FixedClock>,
    }

    fn harness(adapter: Arc<dyn RerunAdapter>) -> Harness {
        let repository: Arc<dyn RunRepository> = Arc::new(InMemoryRunRepository::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        Harness {
            runs: ProcessRunService::new(repository.clone(), adapter, clock.clone()),
            processes: ProcessService::new(repository.clone(), clock.clone()),
            repository,
            clock,
        }
    }

    async fn two_step_run(h: &Harness) -> ProcessRun {
        let process = h
            .processes
            .create_process(
                NewProcess::new("Benefits")
                    .with_step(NewProcessStep::new(0, "Collect"))
                    .with_step(
                        NewProcessStep::new(1, "Decide")
                            .rerunnable(RerunConfig::with_max_retries(1)),
                    ),
            )
            .await
            .unwrap();
        h.runs
            .create_run_with_steps(process.id, RunInput::new("0101901234"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_snapshots_templates() {
        let h = harness(Arc::new(DisabledRerunAdapter));
        let run = two_step_run(&h).await;

        assert_eq!(run.status, RunStatus::Pending);
        assert_eq!(run.steps.len(), 2);
        assert!(!run.steps[0].can_rerun);
        assert_eq!(run.steps[0].max_reruns, 0);
        assert!(run.steps[1].can_rerun);
        assert_eq!(run.steps[1].max_reruns, 1);
        assert_eq!(run.scheduled_deletion_at, None);
    }

    #[tokio::test]
    async fn test_update_rederives_run() {
        let h = harness(Arc::new(DisabledRerunAdapter));
        let run = two_step_run(&h).await;

        h.clock.advance(Duration::minutes(5));
        let step = h
            .runs
            .apply_step_run_update(run.steps[0].id, StepRunPatch::status(StepRunStatus::Running))
            .await
            .unwrap();
        assert_eq!(step.started_at, Some(h.clock.now()));

        let run = h.runs.get_run(run.id, false).await.unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.started_at, Some(h.clock.now()));
    }

    #[tokio::test]
    async fn test_cancel_is_sticky() {
        let h = harness(Arc::new(DisabledRerunAdapter));
        let run = two_step_run(&h).await;

        h.runs.cancel_run(run.id).await.unwrap();
        h.runs
            .apply_step_run_update(run.steps[0].id, StepRunPatch::status(StepRunStatus::Success))
            .await
            .unwrap();

        let run = h.runs.get_run(run.id, false).await.unwrap();
        assert_eq!(run.status, RunStatus::Cancelled);
        assert!(run.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_disabled_adapter_failure_is_recorded() {
        let h = harness(Arc::new(DisabledRerunAdapter));
        let run = two_step_run(&h).await;
        let decide = run.steps[1].id;

        h.runs
            .apply_step_run_update(decide, StepRunPatch::failed_with(json!({"error": "timeout"})))
            .await
            .unwrap();

        let outcome = h.runs.rerun_step(decide).await.unwrap();
        assert_eq!(outcome.trigger_result, RerunResult::NotSupported);
        assert_eq!(outcome.adapter, "disabled");
        assert_eq!(outcome.step_run.status, StepRunStatus::Pending);
        assert_eq!(outcome.step_run.rerun_count, 1);

        let failure = outcome.step_run.failure.unwrap();
        assert_eq!(failure["type"], "rerun_trigger");
        assert_eq!(failure["result"], "not_supported");
        assert_eq!(failure["adapter"], "disabled");

        let stored = h.runs.get_step_run(decide).await.unwrap();
        assert!(stored.failure.is_some());
    }

    #[tokio::test]
    async fn test_rerun_limit_and_listing() {
        let manual = Arc::new(ManualRerunAdapter::new());
        let h = harness(manual.clone());
        let run = two_step_run(&h).await;
        let decide = run.steps[1].id;
        let failed = StepRunPatch::failed_with(json!({"error": "boom"}));

        h.runs.apply_step_run_update(decide, failed.clone()).await.unwrap();
        assert!(h.runs.can_rerun(decide).await.unwrap());
        let listed = h.runs.list_rerunnable_step_runs(run.id).await.unwrap();
        assert_eq!(listed.len(), 1);

        let outcome = h.runs.rerun_step(decide).await.unwrap();
        assert_eq!(outcome.trigger_result, RerunResult::Success);
        assert!(outcome.step_run.failure.is_none());
        assert_eq!(manual.pending_count(), 1);

        h.runs.apply_step_run_update(decide, failed).await.unwrap();
        let err = h.runs.rerun_step(decide).await.unwrap_err();
        assert_eq!(err.error_code(), "max_reruns_exceeded");
        assert!(!h.runs.can_rerun(decide).await.unwrap());
    }

    #[tokio::test]
    async fn test_deleted_run_hides_step_runs() {
        let h = harness(Arc::new(DisabledRerunAdapter));
        let run = two_step_run(&h).await;

        h.runs.soft_delete_run(run.id).await.unwrap();

        let err = h
            .runs
            .apply_step_run_update(run.steps[0].id, StepRunPatch::status(StepRunStatus::Success))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!h.runs.can_rerun(run.steps[1].id).await.unwrap());

        h.runs.restore_run(run.id).await.unwrap();
        assert!(h.runs.get_step_run(run.steps[0].id).await.is_ok());
    }

    #[tokio::test]
    async fn test_deleted_process_cannot_start_runs() {
        let h = harness(Arc::new(DisabledRerunAdapter));
        let process = h
            .processes
            .create_process(NewProcess::new("Closed"))
            .await
            .unwrap();
        h.processes.soft_delete_process(process.id).await.unwrap();

        let err = h
            .runs
            .create_run_with_steps(process.id, RunInput::new("x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_stored_oversized_retention_does_not_schedule() {
        let h = harness(Arc::new(DisabledRerunAdapter));
        // written around the service validation, as an external writer could
        let process = h
            .repository
            .insert_process(
                NewProcess::new("Archive").with_retention_months(10_000_000),
                h.clock.now(),
            )
            .await
            .unwrap();

        let run = h
            .runs
            .create_run_with_steps(process.id, RunInput::new("case-1"))
            .await
            .unwrap();
        assert_eq!(run.scheduled_deletion_at, None);
    }
}
