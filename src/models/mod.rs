pub mod metadata;
pub mod process;
pub mod process_run;
pub mod process_step_run;
pub mod retention;

// Re-export core models for easy access
pub use metadata::{MetaValue, Metadata, RunMetadataSchema};
pub use process::{NewProcess, NewProcessStep, Process, ProcessStep, RerunConfig};
pub use process_run::{NewProcessRun, ProcessRun, RunInput};
pub use process_step_run::{NewProcessStepRun, ProcessStepRun, StepRunPatch};
pub use retention::{
    NeutralizationFailure, NeutralizationResult, RetentionStats, RetentionSweepReport,
};
