use super::states::{RunStatus, StepRunStatus};
use crate::models::ProcessRun;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What a derivation changed on the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationOutcome {
    pub previous: RunStatus,
    pub status: RunStatus,
    pub started_at_set: bool,
    pub finished_at_set: bool,
    pub finished_at_cleared: bool,
}

impl DerivationOutcome {
    pub fn status_changed(&self) -> bool {
        self.previous != self.status
    }

    /// Whether anything at all was written to the run
    pub fn has_side_effects(&self) -> bool {
        self.status_changed()
            || self.started_at_set
            || self.finished_at_set
            || self.finished_at_cleared
    }
}

/// Derives a run's status and timestamps from its step-runs
///
/// The run status is never set by callers. Every step-run mutation is
/// followed by [`RunStateMachine::apply`], which recomputes the status with a
/// fixed precedence and stamps or clears the run timestamps on transitions.
/// Timestamps are only written when unset (or set, for clearing), so repeated
/// application with unchanged steps is a no-op.
pub struct RunStateMachine;

impl RunStateMachine {
    /// Derive the run status from the current status and step statuses
    ///
    /// Precedence, first match wins:
    /// 1. a cancelled run stays cancelled
    /// 2. any failed step fails the run
    /// 3. any cancelled step cancels the run
    /// 4. any running step keeps the run running
    /// 5. all steps success or optional, with at least one success: completed
    /// 6. pending steps remaining after some success: running
    /// 7. otherwise pending, including a run without step-runs
    ///
    /// Rule 6 needs a success next to the pending steps, so a freshly created
    /// all-pending run and a `[Pending, Optional]` run both stay pending.
    pub fn derive_status(current: RunStatus, steps: &[StepRunStatus]) -> RunStatus {
        if current == RunStatus::Cancelled {
            return RunStatus::Cancelled;
        }

        let any = |status: StepRunStatus| steps.contains(&status);

        if any(StepRunStatus::Failed) {
            RunStatus::Failed
        } else if any(StepRunStatus::Cancelled) {
            RunStatus::Cancelled
        } else if any(StepRunStatus::Running) {
            RunStatus::Running
        } else if Self::all_required_complete(steps) {
            RunStatus::Completed
        } else if any(StepRunStatus::Pending) && any(StepRunStatus::Success) {
            RunStatus::Running
        } else {
            RunStatus::Pending
        }
    }

    /// Every step is success or optional and at least one succeeded
    fn all_required_complete(steps: &[StepRunStatus]) -> bool {
        steps.iter().all(StepRunStatus::satisfies_completion)
            && steps.contains(&StepRunStatus::Success)
    }

    /// Recompute the run's status from its step-runs and apply timestamp bookkeeping
    pub fn apply(run: &mut ProcessRun, now: DateTime<Utc>) -> DerivationOutcome {
        let next = Self::derive_status(run.status, &run.step_statuses());
        Self::transition(run, next, now)
    }

    /// Impose cancellation from outside; it sticks through later derivations
    pub fn cancel(run: &mut ProcessRun, now: DateTime<Utc>) -> DerivationOutcome {
        Self::transition(run, RunStatus::Cancelled, now)
    }

    fn transition(run: &mut ProcessRun, next: RunStatus, now: DateTime<Utc>) -> DerivationOutcome {
        let previous = run.status;
        let mut outcome = DerivationOutcome {
            previous,
            status: next,
            started_at_set: false,
            finished_at_set: false,
            finished_at_cleared: false,
        };

        if next == RunStatus::Running && run.started_at.is_none() {
            run.started_at = Some(now);
            outcome.started_at_set = true;
        }

        if !previous.is_terminal() && next.is_terminal() && run.finished_at.is_none() {
            run.finished_at = Some(now);
            outcome.finished_at_set = true;
        }

        if previous.is_terminal() && !next.is_terminal() && run.finished_at.is_some() {
            run.finished_at = None;
            outcome.finished_at_cleared = true;
        }

        run.status = next;

        if outcome.has_side_effects() {
            run.updated_at = now;
        }

        if outcome.status_changed() {
            debug!(
                run_id = run.id,
                from = %previous,
                to = %next,
                "Run status derived from step runs"
            );
        }

        outcome
    }
}
