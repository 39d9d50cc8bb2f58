//! # Rerun Adapters
//!
//! Backends that carry a rerun request to whatever system actually executes
//! the step. The core decides whether a rerun is allowed and commits the
//! reset step-run first; only then is the adapter called, and a non-success
//! result is recorded on the step-run rather than raised.
//!
//! The set of backends is closed: one is chosen at startup from
//! [`RerunAdapterKind`] via [`build_rerun_adapter`], and services receive it
//! as an `Arc<dyn RerunAdapter>`.

pub mod disabled;
pub mod manual;

pub use disabled::DisabledRerunAdapter;
pub use manual::{ManualRerunAdapter, RerunRequest};

use crate::config::RerunSettings;
use crate::models::RerunConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Outcome kind reported by an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerunResult {
    Success,
    Failure,
    NotSupported,
    SourceError,
}

impl RerunResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::NotSupported => "not_supported",
            Self::SourceError => "source_error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for RerunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters handed to an adapter, taken from the step-run's rerun config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerunParams {
    pub step_run_id: i64,
    pub run_id: i64,
    pub config: RerunConfig,
}

#[async_trait]
pub trait RerunAdapter: Send + Sync {
    /// Whether the backend is able to rerun this step-run at all
    async fn can_rerun(&self, step_run_id: i64) -> bool;

    /// Ask the backend to rerun the step-run
    async fn trigger_rerun(
        &self,
        step_run_id: i64,
        params: &RerunParams,
    ) -> (RerunResult, Option<String>);

    fn adapter_name(&self) -> &'static str;
}

/// Backends selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerunAdapterKind {
    #[default]
    Disabled,
    Manual,
}

pub fn build_rerun_adapter(settings: &RerunSettings) -> Arc<dyn RerunAdapter> {
    match settings.adapter {
        RerunAdapterKind::Disabled => Arc::new(DisabledRerunAdapter),
        RerunAdapterKind::Manual => Arc::new(ManualRerunAdapter::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_wire_names() {
        assert_eq!(
            serde_json::to_value(RerunResult::NotSupported).unwrap(),
            serde_json::json!("not_supported")
        );
        assert_eq!(RerunResult::SourceError.to_string(), "source_error");
        assert!(RerunResult::Success.is_success());
    }

    #[test]
    fn test_build_selects_configured_backend() {
        let mut settings = RerunSettings::default();
        assert_eq!(build_rerun_adapter(&settings).adapter_name(), "disabled");

        settings.adapter = RerunAdapterKind::Manual;
        assert_eq!(build_rerun_adapter(&settings).adapter_name(), "manual");
    }
}
