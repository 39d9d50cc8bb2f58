use super::states::StepRunStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a step-run rerun can be refused, checked in this order
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RerunDenied {
    #[error("step run {step_run_id} is not configured as rerunnable")]
    NotRerunnable { step_run_id: i64 },

    #[error("step run {step_run_id} exceeded its max reruns ({max_reruns})")]
    MaxRerunsExceeded { step_run_id: i64, max_reruns: u32 },

    #[error("step run {step_run_id} must be in failed status to be rerun (current: {status})")]
    NotFailed {
        step_run_id: i64,
        status: StepRunStatus,
    },
}

impl RerunDenied {
    /// Stable machine-readable code for the denial reason
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotRerunnable { .. } => "not_rerunnable",
            Self::MaxRerunsExceeded { .. } => "max_reruns_exceeded",
            Self::NotFailed { .. } => "not_failed",
        }
    }
}

pub type GuardResult<T> = Result<T, RerunDenied>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denial_messages_are_distinct() {
        let denials = [
            RerunDenied::NotRerunnable { step_run_id: 1 },
            RerunDenied::MaxRerunsExceeded {
                step_run_id: 1,
                max_reruns: 3,
            },
            RerunDenied::NotFailed {
                step_run_id: 1,
                status: StepRunStatus::Running,
            },
        ];

        let messages: Vec<String> = denials.iter().map(ToString::to_string).collect();
        assert!(messages[0].contains("not configured as rerunnable"));
        assert!(messages[1].contains("max reruns"));
        assert!(messages[2].contains("must be in failed status"));
        assert!(messages[2].contains("running"));
    }

    #[test]
    fn test_denial_serializes_with_reason_tag() {
        let json = serde_json::to_value(RerunDenied::MaxRerunsExceeded {
            step_run_id: 9,
            max_reruns: 2,
        })
        .unwrap();
        assert_eq!(json["reason"], "max_reruns_exceeded");
        assert_eq!(json["max_reruns"], 2);
    }
}
