//! Operator-driven rerun backend.
//!
//! Accepted requests are queued in memory for an operator to pick up; nothing
//! is executed automatically.

use super::{RerunAdapter, RerunParams, RerunResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerunRequest {
    pub params: RerunParams,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ManualRerunAdapter {
    requests: DashMap<i64, RerunRequest>,
}

impl ManualRerunAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending request for a step-run, if one was triggered
    pub fn request(&self, step_run_id: i64) -> Option<RerunRequest> {
        self.requests.get(&step_run_id).map(|entry| entry.value().clone())
    }

    /// Remove a request once an operator has handled it
    pub fn acknowledge(&self, step_run_id: i64) -> Option<RerunRequest> {
        self.requests.remove(&step_run_id).map(|(_, request)| request)
    }

    pub fn pending_count(&self) -> usize {
        self.requests.len()
    }
}

#[async_trait]
impl RerunAdapter for ManualRerunAdapter {
    async fn can_rerun(&self, _step_run_id: i64) -> bool {
        true
    }

    async fn trigger_rerun(
        &self,
        step_run_id: i64,
        params: &RerunParams,
    ) -> (RerunResult, Option<String>) {
        self.requests.insert(
            step_run_id,
            RerunRequest {
                params: params.clone(),
                requested_at: Utc::now(),
            },
        );

        info!(
            step_run_id = step_run_id,
            run_id = params.run_id,
            "Rerun queued for operator"
        );

        (
            RerunResult::Success,
            Some(format!("Rerun of step run {step_run_id} queued for an operator")),
        )
    }

    fn adapter_name(&self) -> &'static str {
        "manual"
    }
}
