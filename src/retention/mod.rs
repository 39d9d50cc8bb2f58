//! # Data Retention
//!
//! Retention deadlines, neutralization of personal data, the retention sweep
//! and the soft-delete cascade.

pub mod calculator;
pub mod neutralizer;
pub mod service;
pub mod soft_delete;
pub mod sweeper;

pub use calculator::{compute_scheduled_deletion, scheduled_deletion_for};
pub use neutralizer::{NeutralizationOutcome, Neutralizer};
pub use service::RetentionService;
pub use soft_delete::SoftDeleteCoordinator;
pub use sweeper::{RetentionSweeper, RetentionSweeperHandle};
