//! # System Constants
//!
//! Constants that define the operational boundaries of run tracking and data
//! retention.

// Re-export state types for convenience
pub use crate::state_machine::{RunStatus, StepRunStatus};

/// Key in process metadata that declares the expected run metadata fields
pub const RUN_METADATA_SCHEMA_KEY: &str = "run_metadata_schema";

/// Reruns allowed when a rerunnable template does not set `max_retries`
pub const DEFAULT_MAX_RERUNS: u32 = 3;

pub mod retention {
    /// Retention months are converted with a fixed 30-day month.
    ///
    /// This is a deliberate approximation, not calendar arithmetic: six months
    /// of retention is always exactly 180 days.
    pub const DAYS_PER_RETENTION_MONTH: i64 = 30;

    /// Longest accepted retention period (100 years)
    pub const MAX_RETENTION_MONTHS: i32 = 1200;

    /// Prefix of the placeholder that replaces a neutralized entity id
    pub const NEUTRALIZED_ENTITY_PREFIX: &str = "NEUTRALIZED_";

    /// Replacement for string metadata that is not on the allow-list
    pub const REDACTION_MARKER: &str = "[NEUTRALIZED]";

    /// Metadata keys kept through neutralization for statistics
    pub const DEFAULT_SAFE_METADATA_KEYS: &[&str] = &["category", "type", "department", "status_code"];

    pub const DEFAULT_BATCH_SIZE: usize = 100;

    pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 3600;

    /// Due run ids included in retention statistics
    pub const STATS_SAMPLE_SIZE: usize = 10;
}

/// Lifecycle event names used in structured logs
pub mod events {
    pub const RUN_CREATED: &str = "run.created";
    pub const RUN_STATUS_CHANGED: &str = "run.status_changed";
    pub const RUN_SOFT_DELETED: &str = "run.soft_deleted";
    pub const RUN_RESTORED: &str = "run.restored";
    pub const RUN_NEUTRALIZED: &str = "run.neutralized";

    pub const STEP_RUN_UPDATED: &str = "step_run.updated";
    pub const STEP_RUN_RERUN_REQUESTED: &str = "step_run.rerun_requested";
    pub const STEP_RUN_RERUN_DENIED: &str = "step_run.rerun_denied";
    pub const STEP_RUN_RERUN_TRIGGER_FAILED: &str = "step_run.rerun_trigger_failed";

    pub const PROCESS_SOFT_DELETED: &str = "process.soft_deleted";
    pub const PROCESS_RESTORED: &str = "process.restored";
    pub const PROCESS_RETENTION_UPDATED: &str = "process.retention_updated";

    pub const RETENTION_SWEEP_COMPLETED: &str = "retention.sweep_completed";
}

/// `type` value of the failure payload written when a rerun trigger fails
pub const RERUN_TRIGGER_FAILURE_TYPE: &str = "rerun_trigger";
