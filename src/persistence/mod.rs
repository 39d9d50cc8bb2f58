//! # Persistence
//!
//! The repository is the transaction boundary of the core. Every method is one
//! atomic unit of work: a run is always written together with all of its
//! step-runs, and a process together with all of its step templates, so a
//! committed run can never disagree with its step-runs.
//!
//! Two implementations ship with the crate:
//! - [`InMemoryRunRepository`] - arena maps behind a single lock
//! - `PgRunRepository` - PostgreSQL via SQLx (feature `postgres`)

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryRunRepository;
#[cfg(feature = "postgres")]
pub use postgres::PgRunRepository;

use crate::error::Result;
use crate::models::{NewProcess, NewProcessRun, NewProcessStep, Process, ProcessRun};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Insert a process with its step templates
    async fn insert_process(&self, new_process: NewProcess, now: DateTime<Utc>) -> Result<Process>;

    /// Append a step template to an existing process
    async fn insert_process_step(
        &self,
        process_id: i64,
        new_step: NewProcessStep,
        now: DateTime<Utc>,
    ) -> Result<Process>;

    /// Load a process with its step templates ordered by index
    async fn find_process(&self, process_id: i64, include_deleted: bool) -> Result<Option<Process>>;

    /// Persist a process and all of its step templates
    async fn save_process(&self, process: &Process) -> Result<()>;

    /// Insert a run and all of its step-runs
    async fn insert_run(&self, new_run: NewProcessRun) -> Result<ProcessRun>;

    /// Load a run with its step-runs ordered by step index
    async fn find_run(&self, run_id: i64, include_deleted: bool) -> Result<Option<ProcessRun>>;

    /// Resolve the owning run of a step-run
    async fn find_run_id_for_step_run(&self, step_run_id: i64) -> Result<Option<i64>>;

    /// Persist a run and all of its step-runs
    async fn save_run(&self, run: &ProcessRun) -> Result<()>;

    /// Runs past their retention deadline, not neutralized and not deleted,
    /// oldest deadline first
    async fn find_due_runs(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ProcessRun>>;

    /// Ids of due runs in the same order as [`RunRepository::find_due_runs`]
    ///
    /// Reads no run contents, so a run whose stored data no longer decodes
    /// is still listed.
    async fn find_due_run_ids(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<i64>>;

    async fn count_due_runs(&self, now: DateTime<Utc>) -> Result<usize>;
}
