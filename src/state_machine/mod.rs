// State machine module for process runs
//
// Run status is derived from step-run statuses rather than driven by events,
// and step-run reruns are gated by guards.

pub mod errors;
pub mod guards;
pub mod run_state_machine;
pub mod states;

// Re-export main types for convenient access
pub use errors::{GuardResult, RerunDenied};
pub use guards::{RerunPolicy, StateGuard};
pub use run_state_machine::{DerivationOutcome, RunStateMachine};
pub use states::{RunStatus, StepRunStatus};
