//! Result types for retention and neutralization operations.

use serde::{Deserialize, Serialize};

/// Outcome of neutralizing a single run on request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeutralizationResult {
    pub run_id: i64,
    pub was_already_neutralized: bool,
    pub success: bool,
    pub message: String,
}

/// A run the sweep could not neutralize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeutralizationFailure {
    pub run_id: i64,
    pub error: String,
}

/// Statistics from one retention sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionSweepReport {
    pub total_found: usize,
    pub neutralized: usize,
    pub failed: usize,
    pub errors: Vec<NeutralizationFailure>,
}

impl RetentionSweepReport {
    pub fn record_success(&mut self) {
        self.neutralized += 1;
    }

    pub fn record_failure(&mut self, run_id: i64, error: impl ToString) {
        self.failed += 1;
        self.errors.push(NeutralizationFailure {
            run_id,
            error: error.to_string(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Snapshot of runs waiting for neutralization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionStats {
    pub runs_due_for_neutralization: usize,
    pub sample_run_ids: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_tracks_failures() {
        let mut report = RetentionSweepReport {
            total_found: 2,
            ..Default::default()
        };
        report.record_success();
        report.record_failure(8, "connection reset");

        assert_eq!(report.neutralized, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors[0].run_id, 8);
        assert!(!report.is_clean());
    }
}
