#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Run Ledger Core
//!
//! Core of a process-run tracking service: it records runs of multi-step
//! processes against an entity (a citizen, a case), keeps each run's status
//! consistent with its steps, gates step reruns, and neutralizes personal data
//! once a run's retention period has passed.
//!
//! ## Overview
//!
//! - **Status derivation**: a run's status and timestamps are a pure function
//!   of its step-run statuses, applied after every step-run mutation. An
//!   externally imposed cancellation is the one exception and is sticky.
//! - **Reruns**: a failed step-run can be reset for another attempt while it
//!   has reruns left; the reset is committed before an external adapter is
//!   asked to perform it.
//! - **Retention**: each run gets a neutralization deadline at creation. A
//!   sweep replaces personal data on due runs with placeholders while keeping
//!   the rows for statistics.
//! - **Soft delete**: reversible deletion cascades from runs to step-runs and
//!   from processes to step templates, independent of neutralization.
//!
//! ## Module Organization
//!
//! - [`models`] - processes, step templates, runs, step-runs and metadata
//! - [`state_machine`] - run status derivation and rerun guards
//! - [`retention`] - deadlines, neutralization, sweeps and soft delete
//! - [`services`] - run and process operations over a repository
//! - [`persistence`] - repository trait with in-memory and PostgreSQL backends
//! - [`adapters`] - rerun trigger backends
//! - [`config`] - layered configuration
//! - [`error`] - structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use runledger_core::adapters::DisabledRerunAdapter;
//! use runledger_core::models::{NewProcess, NewProcessStep, RunInput, StepRunPatch};
//! use runledger_core::persistence::InMemoryRunRepository;
//! use runledger_core::services::{ProcessRunService, ProcessService};
//! use runledger_core::state_machine::StepRunStatus;
//! use runledger_core::utils::SystemClock;
//!
//! # async fn example() -> runledger_core::Result<()> {
//! let repository = Arc::new(InMemoryRunRepository::new());
//! let clock = Arc::new(SystemClock);
//! let processes = ProcessService::new(repository.clone(), clock.clone());
//! let runs = ProcessRunService::new(repository, Arc::new(DisabledRerunAdapter), clock);
//!
//! let process = processes
//!     .create_process(
//!         NewProcess::new("Benefit application")
//!             .with_retention_months(6)
//!             .with_step(NewProcessStep::new(0, "Collect documents")),
//!     )
//!     .await?;
//!
//! let run = runs
//!     .create_run_with_steps(process.id, RunInput::new("case-1042"))
//!     .await?;
//! runs.apply_step_run_update(run.steps[0].id, StepRunPatch::status(StepRunStatus::Success))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod persistence;
pub mod retention;
pub mod services;
pub mod state_machine;
pub mod utils;

pub use config::{ConfigManager, RunLedgerConfig};
pub use constants::events as system_events;
pub use error::{ResourceKind, Result, RunLedgerError};
pub use models::{
    MetaValue, Metadata, NewProcess, NewProcessStep, Process, ProcessRun, ProcessStep,
    ProcessStepRun, RunInput, StepRunPatch,
};
pub use persistence::{InMemoryRunRepository, RunRepository};
#[cfg(feature = "postgres")]
pub use persistence::PgRunRepository;
pub use retention::{RetentionService, RetentionSweeper};
pub use services::{ProcessRunService, ProcessService, RerunOutcome};
pub use state_machine::{RerunDenied, RunStateMachine, RunStatus, StepRunStatus};
