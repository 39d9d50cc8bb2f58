pub mod process_service;
pub mod run_service;

pub use process_service::ProcessService;
pub use run_service::{ProcessRunService, RerunOutcome};
