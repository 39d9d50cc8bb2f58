//! Repository wrapper that fails writes or loads for chosen runs.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use runledger_core::error::{Result, RunLedgerError};
use runledger_core::models::{NewProcess, NewProcessRun, NewProcessStep, Process, ProcessRun};
use runledger_core::persistence::{InMemoryRunRepository, RunRepository};

#[derive(Default)]
pub struct FailingSaveRepository {
    inner: InMemoryRunRepository,
    failing_runs: DashSet<i64>,
    unreadable_runs: DashSet<i64>,
}

impl FailingSaveRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_saves_for(&self, run_id: i64) {
        self.failing_runs.insert(run_id);
    }

    /// Make loads of the run fail, as for a stored row that no longer decodes
    pub fn fail_loads_for(&self, run_id: i64) {
        self.unreadable_runs.insert(run_id);
    }

    pub fn heal(&self, run_id: i64) {
        self.failing_runs.remove(&run_id);
        self.unreadable_runs.remove(&run_id);
    }
}

#[async_trait]
impl RunRepository for FailingSaveRepository {
    async fn insert_process(&self, new_process: NewProcess, now: DateTime<Utc>) -> Result<Process> {
        self.inner.insert_process(new_process, now).await
    }

    async fn insert_process_step(
        &self,
        process_id: i64,
        new_step: NewProcessStep,
        now: DateTime<Utc>,
    ) -> Result<Process> {
        self.inner.insert_process_step(process_id, new_step, now).await
    }

    async fn find_process(&self, process_id: i64, include_deleted: bool) -> Result<Option<Process>> {
        self.inner.find_process(process_id, include_deleted).await
    }

    async fn save_process(&self, process: &Process) -> Result<()> {
        self.inner.save_process(process).await
    }

    async fn insert_run(&self, new_run: NewProcessRun) -> Result<ProcessRun> {
        self.inner.insert_run(new_run).await
    }

    async fn find_run(&self, run_id: i64, include_deleted: bool) -> Result<Option<ProcessRun>> {
        if self.unreadable_runs.contains(&run_id) {
            return Err(RunLedgerError::validation(format!(
                "metadata field 'address' of run {run_id} must be a string, number, boolean or null"
            )));
        }
        self.inner.find_run(run_id, include_deleted).await
    }

    async fn find_run_id_for_step_run(&self, step_run_id: i64) -> Result<Option<i64>> {
        self.inner.find_run_id_for_step_run(step_run_id).await
    }

    async fn save_run(&self, run: &ProcessRun) -> Result<()> {
        if self.failing_runs.contains(&run.id) {
            return Err(RunLedgerError::Database(format!(
                "simulated write failure for run {}",
                run.id
            )));
        }
        self.inner.save_run(run).await
    }

    async fn find_due_runs(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ProcessRun>> {
        self.inner.find_due_runs(now, limit).await
    }

    async fn find_due_run_ids(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<i64>> {
        self.inner.find_due_run_ids(now, limit).await
    }

    async fn count_due_runs(&self, now: DateTime<Utc>) -> Result<usize> {
        self.inner.count_due_runs(now).await
    }
}
