use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate status of a process run, derived from its step-runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Initial state when the run is created
    #[default]
    Pending,
    /// At least one step is executing or the run has made partial progress
    Running,
    /// Every required step succeeded
    Completed,
    /// A step failed
    Failed,
    /// Cancelled externally or by a cancelled step; sticky
    Cancelled,
}

impl RunStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Check if the run is currently active
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid run status: {s}")),
        }
    }
}

/// Status of a single step-run within a process run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepRunStatus {
    /// Initial state when the step-run is created
    #[default]
    Pending,
    /// Step is currently being executed
    Running,
    /// Step completed successfully
    Success,
    /// Step failed
    Failed,
    /// Step was cancelled
    Cancelled,
    /// Step was skipped as non-required
    Optional,
}

impl StepRunStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failed | Self::Cancelled | Self::Optional
        )
    }

    /// Check if this step no longer blocks run completion
    pub fn satisfies_completion(&self) -> bool {
        matches!(self, Self::Success | Self::Optional)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Optional => "optional",
        }
    }
}

impl fmt::Display for StepRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StepRunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "optional" => Ok(Self::Optional),
            _ => Err(format!("Invalid step run status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_terminal_check() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn test_step_status_completion_satisfaction() {
        assert!(StepRunStatus::Success.satisfies_completion());
        assert!(StepRunStatus::Optional.satisfies_completion());
        assert!(!StepRunStatus::Pending.satisfies_completion());
        assert!(!StepRunStatus::Running.satisfies_completion());
        assert!(!StepRunStatus::Failed.satisfies_completion());
        assert!(!StepRunStatus::Cancelled.satisfies_completion());
    }

    #[test]
    fn test_status_string_conversion() {
        assert_eq!(RunStatus::Completed.to_string(), "completed");
        assert_eq!("running".parse::<RunStatus>().unwrap(), RunStatus::Running);
        assert_eq!(StepRunStatus::Optional.to_string(), "optional");
        assert_eq!(
            "failed".parse::<StepRunStatus>().unwrap(),
            StepRunStatus::Failed
        );
        assert!("complete".parse::<RunStatus>().is_err());
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&StepRunStatus::Success).unwrap();
        assert_eq!(json, "\"success\"");

        let parsed: RunStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(parsed, RunStatus::Cancelled);
    }
}
