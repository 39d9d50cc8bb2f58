//! # Retention Service
//!
//! Finds runs whose retention deadline has passed and neutralizes them.
//!
//! A sweep is best effort: each run is loaded, neutralized and committed on
//! its own, and a failure is recorded in the report without stopping the
//! batch. A run that failed, or was never reached, is still due and is picked
//! up again by the next sweep.

use super::neutralizer::{NeutralizationOutcome, Neutralizer};
use crate::config::RetentionConfig;
use crate::constants::events;
use crate::constants::retention::STATS_SAMPLE_SIZE;
use crate::error::{ResourceKind, Result, RunLedgerError};
use crate::logging::{log_error, log_retention_operation};
use crate::models::{NeutralizationResult, ProcessRun, RetentionStats, RetentionSweepReport};
use crate::persistence::RunRepository;
use crate::utils::Clock;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

pub struct RetentionService {
    repository: Arc<dyn RunRepository>,
    clock: Arc<dyn Clock>,
    neutralizer: Neutralizer,
}

impl RetentionService {
    pub fn new(repository: Arc<dyn RunRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            neutralizer: Neutralizer::default(),
        }
    }

    pub fn from_config(
        repository: Arc<dyn RunRepository>,
        clock: Arc<dyn Clock>,
        config: &RetentionConfig,
    ) -> Self {
        Self {
            repository,
            clock,
            neutralizer: Neutralizer::from_config(config),
        }
    }

    pub fn neutralizer(&self) -> &Neutralizer {
        &self.neutralizer
    }

    /// Due runs, oldest deadline first
    pub async fn find_due_runs(&self, limit: usize) -> Result<Vec<ProcessRun>> {
        self.repository.find_due_runs(self.clock.now(), limit).await
    }

    /// Neutralize up to `batch_size` due runs, isolating per-run failures
    pub async fn neutralize_due_runs(&self, batch_size: usize) -> Result<RetentionSweepReport> {
        if batch_size == 0 {
            return Err(RunLedgerError::validation("batch_size must be greater than 0"));
        }

        let now = self.clock.now();
        let due = self.repository.find_due_run_ids(now, batch_size).await?;
        let mut report = RetentionSweepReport {
            total_found: due.len(),
            ..Default::default()
        };

        for run_id in due {
            match self.load_and_neutralize(run_id, now).await {
                Ok(_) => report.record_success(),
                Err(err) => {
                    log_error(
                        "retention",
                        "neutralize_due_runs",
                        &err.to_string(),
                        Some(&format!("run_id={run_id}")),
                    );
                    report.record_failure(run_id, err);
                }
            }
        }

        info!(
            event = events::RETENTION_SWEEP_COMPLETED,
            total_found = report.total_found,
            neutralized = report.neutralized,
            failed = report.failed,
            "Retention sweep completed"
        );
        log_retention_operation(
            events::RETENTION_SWEEP_COMPLETED,
            None,
            Some(report.total_found),
            Some(report.neutralized),
            Some(report.failed),
        );

        Ok(report)
    }

    /// Entry point for schedulers and the CLI; same as [`Self::neutralize_due_runs`]
    pub async fn sweep_retention(&self, batch_size: usize) -> Result<RetentionSweepReport> {
        self.neutralize_due_runs(batch_size).await
    }

    /// Neutralize one run on request, whether or not it is due
    ///
    /// Soft-deleted runs are included. An already neutralized run is a
    /// successful no-op.
    pub async fn neutralize_run(&self, run_id: i64) -> Result<NeutralizationResult> {
        let run = self
            .repository
            .find_run(run_id, true)
            .await?
            .ok_or_else(|| RunLedgerError::not_found(ResourceKind::ProcessRun, run_id))?;

        let outcome = self.neutralize_and_save(run, self.clock.now()).await?;
        let was_already_neutralized = outcome == NeutralizationOutcome::AlreadyNeutralized;

        Ok(NeutralizationResult {
            run_id,
            was_already_neutralized,
            success: true,
            message: if was_already_neutralized {
                format!("Run {run_id} was already neutralized")
            } else {
                format!("Run {run_id} neutralized")
            },
        })
    }

    pub async fn retention_stats(&self, sample_size: Option<usize>) -> Result<RetentionStats> {
        let now = self.clock.now();
        let sample_size = sample_size.unwrap_or(STATS_SAMPLE_SIZE);

        let runs_due_for_neutralization = self.repository.count_due_runs(now).await?;
        let sample_run_ids = self.repository.find_due_run_ids(now, sample_size).await?;

        Ok(RetentionStats {
            runs_due_for_neutralization,
            sample_run_ids,
        })
    }

    async fn load_and_neutralize(
        &self,
        run_id: i64,
        now: DateTime<Utc>,
    ) -> Result<NeutralizationOutcome> {
        let run = self
            .repository
            .find_run(run_id, false)
            .await?
            .ok_or_else(|| RunLedgerError::not_found(ResourceKind::ProcessRun, run_id))?;
        self.neutralize_and_save(run, now).await
    }

    async fn neutralize_and_save(
        &self,
        mut run: ProcessRun,
        now: DateTime<Utc>,
    ) -> Result<NeutralizationOutcome> {
        let outcome = self.neutralizer.neutralize(&mut run, now);

        if outcome == NeutralizationOutcome::Neutralized {
            self.repository.save_run(&run).await?;
            log_retention_operation(events::RUN_NEUTRALIZED, Some(run.id), None, None, None);
        } else {
            debug!(run_id = run.id, "Run already neutralized, nothing to do");
        }

        Ok(outcome)
    }
}
