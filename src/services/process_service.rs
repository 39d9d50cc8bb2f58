//! # Process Service
//!
//! Process definitions and their step templates: creation, retention policy
//! and the soft-delete cascade from a process to its steps.

use crate::constants::events;
use crate::constants::retention::MAX_RETENTION_MONTHS;
use crate::error::{ResourceKind, Result, RunLedgerError};
use crate::logging::log_run_operation;
use crate::models::{NewProcess, NewProcessStep, Process};
use crate::persistence::RunRepository;
use crate::retention::SoftDeleteCoordinator;
use crate::utils::Clock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct ProcessService {
    repository: Arc<dyn RunRepository>,
    clock: Arc<dyn Clock>,
}

impl ProcessService {
    pub fn new(repository: Arc<dyn RunRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub async fn create_process(&self, new_process: NewProcess) -> Result<Process> {
        if new_process.name.trim().is_empty() {
            return Err(RunLedgerError::validation("process name must not be empty"));
        }
        validate_retention_months(new_process.retention_months)?;

        let mut seen = HashSet::new();
        for step in &new_process.steps {
            validate_step(step)?;
            if !seen.insert(step.index) {
                return Err(RunLedgerError::validation(format!(
                    "duplicate step index {} in process '{}'",
                    step.index, new_process.name
                )));
            }
        }

        let process = self
            .repository
            .insert_process(new_process, self.clock.now())
            .await?;

        info!(
            process_id = process.id,
            steps = process.steps.len(),
            retention_months = ?process.retention_months,
            "Process created"
        );
        Ok(process)
    }

    /// Load a process, treating a soft-deleted one as absent unless asked
    pub async fn get_process(&self, process_id: i64, include_deleted: bool) -> Result<Process> {
        self.repository
            .find_process(process_id, include_deleted)
            .await?
            .ok_or_else(|| RunLedgerError::not_found(ResourceKind::Process, process_id))
    }

    /// Append a step template; existing runs are unaffected
    pub async fn add_step(&self, process_id: i64, new_step: NewProcessStep) -> Result<Process> {
        validate_step(&new_step)?;

        let process = self.get_process(process_id, false).await?;
        if process.active_steps().any(|step| step.index == new_step.index) {
            return Err(RunLedgerError::validation(format!(
                "process {process_id} already has a step at index {}",
                new_step.index
            )));
        }

        self.repository
            .insert_process_step(process_id, new_step, self.clock.now())
            .await
    }

    /// Change the retention period used for runs created from now on
    ///
    /// Deadlines already stamped on existing runs are left untouched.
    pub async fn update_retention_period(
        &self,
        process_id: i64,
        retention_months: Option<i32>,
    ) -> Result<Process> {
        validate_retention_months(retention_months)?;

        let mut process = self.get_process(process_id, false).await?;
        let previous = process.retention_months;
        process.retention_months = retention_months;
        process.updated_at = self.clock.now();
        self.repository.save_process(&process).await?;

        info!(
            event = events::PROCESS_RETENTION_UPDATED,
            process_id = process_id,
            from = ?previous,
            to = ?retention_months,
            "Process retention period updated"
        );
        Ok(process)
    }

    pub async fn soft_delete_process(&self, process_id: i64) -> Result<Process> {
        let mut process = self.get_process(process_id, true).await?;

        if SoftDeleteCoordinator::soft_delete_process(&mut process, self.clock.now()) {
            self.repository.save_process(&process).await?;
            log_run_operation(
                events::PROCESS_SOFT_DELETED,
                None,
                Some(process_id),
                "deleted",
                None,
            );
        }
        Ok(process)
    }

    pub async fn restore_process(&self, process_id: i64) -> Result<Process> {
        let mut process = self.get_process(process_id, true).await?;

        if SoftDeleteCoordinator::restore_process(&mut process, self.clock.now()) {
            self.repository.save_process(&process).await?;
            log_run_operation(
                events::PROCESS_RESTORED,
                None,
                Some(process_id),
                "restored",
                None,
            );
        }
        Ok(process)
    }
}

fn validate_retention_months(retention_months: Option<i32>) -> Result<()> {
    match retention_months {
        Some(months) if months < 0 => Err(RunLedgerError::validation(format!(
            "retention_months must not be negative, got {months}"
        ))),
        Some(months) if months > MAX_RETENTION_MONTHS => Err(RunLedgerError::validation(format!(
            "retention_months must be at most {MAX_RETENTION_MONTHS}, got {months}"
        ))),
        _ => Ok(()),
    }
}

fn validate_step(step: &NewProcessStep) -> Result<()> {
    if step.index < 0 {
        return Err(RunLedgerError::validation(format!(
            "step index must not be negative, got {}",
            step.index
        )));
    }
    if step.name.trim().is_empty() {
        return Err(RunLedgerError::validation("step name must not be empty"));
    }
    Ok(())
}
