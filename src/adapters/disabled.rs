use super::{RerunAdapter, RerunParams, RerunResult};
use async_trait::async_trait;

/// Backend used when no rerun system is configured
///
/// Reruns are still recorded by the core; the trigger result is always
/// `not_supported`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRerunAdapter;

#[async_trait]
impl RerunAdapter for DisabledRerunAdapter {
    async fn can_rerun(&self, _step_run_id: i64) -> bool {
        false
    }

    async fn trigger_rerun(
        &self,
        _step_run_id: i64,
        _params: &RerunParams,
    ) -> (RerunResult, Option<String>) {
        (
            RerunResult::NotSupported,
            Some("No rerun adapter is configured".to_string()),
        )
    }

    fn adapter_name(&self) -> &'static str {
        "disabled"
    }
}
