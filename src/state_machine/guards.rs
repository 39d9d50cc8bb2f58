use super::errors::{GuardResult, RerunDenied};
use super::states::StepRunStatus;
use crate::models::ProcessStepRun;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Trait for implementing state transition guards
pub trait StateGuard<T> {
    /// Check if a transition is allowed
    fn check(&self, entity: &T) -> GuardResult<()>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// Guard to check the step-run was created from a rerunnable template
pub struct StepRerunnableGuard;

impl StateGuard<ProcessStepRun> for StepRerunnableGuard {
    fn check(&self, step_run: &ProcessStepRun) -> GuardResult<()> {
        if step_run.can_rerun {
            Ok(())
        } else {
            Err(RerunDenied::NotRerunnable {
                step_run_id: step_run.id,
            })
        }
    }

    fn description(&self) -> &'static str {
        "Step run must be configured as rerunnable"
    }
}

/// Guard to check the step-run has reruns left
pub struct RerunLimitGuard;

impl StateGuard<ProcessStepRun> for RerunLimitGuard {
    fn check(&self, step_run: &ProcessStepRun) -> GuardResult<()> {
        if step_run.has_exceeded_rerun_limit() {
            Err(RerunDenied::MaxRerunsExceeded {
                step_run_id: step_run.id,
                max_reruns: step_run.max_reruns,
            })
        } else {
            Ok(())
        }
    }

    fn description(&self) -> &'static str {
        "Step run must have reruns remaining"
    }
}

/// Guard to check the step-run is in failed status
pub struct StepFailedGuard;

impl StateGuard<ProcessStepRun> for StepFailedGuard {
    fn check(&self, step_run: &ProcessStepRun) -> GuardResult<()> {
        match step_run.status {
            StepRunStatus::Failed => Ok(()),
            status => Err(RerunDenied::NotFailed {
                step_run_id: step_run.id,
                status,
            }),
        }
    }

    fn description(&self) -> &'static str {
        "Step run must be in failed state to be rerun"
    }
}

/// Rerun eligibility and counter enforcement for step-runs
///
/// Guards run in a fixed order and the first failure is reported.
pub struct RerunPolicy {
    guards: Vec<Box<dyn StateGuard<ProcessStepRun> + Send + Sync>>,
}

impl Default for RerunPolicy {
    fn default() -> Self {
        Self {
            guards: vec![
                Box::new(StepRerunnableGuard),
                Box::new(RerunLimitGuard),
                Box::new(StepFailedGuard),
            ],
        }
    }
}

impl RerunPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, step_run: &ProcessStepRun) -> GuardResult<()> {
        for guard in &self.guards {
            if let Err(denied) = guard.check(step_run) {
                debug!(
                    step_run_id = step_run.id,
                    guard = guard.description(),
                    reason = denied.code(),
                    "Rerun guard rejected step run"
                );
                return Err(denied);
            }
        }
        Ok(())
    }

    pub fn can_rerun(&self, step_run: &ProcessStepRun) -> bool {
        self.check(step_run).is_ok()
    }

    /// Reset a failed step-run for another attempt
    ///
    /// Increments `rerun_count`, moves the step back to pending and clears its
    /// timestamps and failure. The parent run must be re-derived afterwards.
    pub fn attempt_rerun(
        &self,
        step_run: &mut ProcessStepRun,
        now: DateTime<Utc>,
    ) -> GuardResult<()> {
        self.check(step_run)?;

        step_run.rerun_count += 1;
        step_run.status = StepRunStatus::Pending;
        step_run.started_at = None;
        step_run.finished_at = None;
        step_run.failure = None;
        step_run.updated_at = now;

        Ok(())
    }
}
