//! Error types for the run ledger core.

use crate::state_machine::errors::RerunDenied;
use std::fmt;
use thiserror::Error;

/// Kinds of records the core can fail to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Process,
    ProcessStep,
    ProcessRun,
    ProcessStepRun,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Process => write!(f, "Process"),
            Self::ProcessStep => write!(f, "Process step"),
            Self::ProcessRun => write!(f, "Process run"),
            Self::ProcessStepRun => write!(f, "Process step run"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunLedgerError {
    #[error("{resource} with id '{id}' not found")]
    NotFound { resource: ResourceKind, id: i64 },
    #[error("Rerun denied: {0}")]
    RerunDenied(#[from] RerunDenied),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Background task error: {0}")]
    Task(String),
}

impl RunLedgerError {
    pub fn not_found(resource: ResourceKind, id: i64) -> Self {
        Self::NotFound { resource, id }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Stable code for mapping onto API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::RerunDenied(denied) => denied.code(),
            Self::Validation(_) => "validation_error",
            Self::Database(_) => "database_error",
            Self::Configuration(_) => "configuration_error",
            Self::Task(_) => "task_error",
        }
    }
}

impl From<serde_json::Error> for RunLedgerError {
    fn from(error: serde_json::Error) -> Self {
        RunLedgerError::Validation(format!("JSON serialization error: {error}"))
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for RunLedgerError {
    fn from(err: sqlx::Error) -> Self {
        RunLedgerError::Database(err.to_string())
    }
}

impl From<crate::config::ConfigurationError> for RunLedgerError {
    fn from(err: crate::config::ConfigurationError) -> Self {
        RunLedgerError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RunLedgerError>;
