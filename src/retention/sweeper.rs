//! Background retention sweep.
//!
//! Runs [`RetentionService::sweep_retention`] on a fixed interval until the
//! handle is shut down. A failed sweep is logged and the loop keeps going;
//! runs it could not reach stay due for the next tick.

use super::service::RetentionService;
use crate::config::RetentionConfig;
use crate::error::{Result, RunLedgerError};
use crate::logging::log_error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

pub struct RetentionSweeper {
    service: Arc<RetentionService>,
    batch_size: usize,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(service: Arc<RetentionService>, batch_size: usize, interval: Duration) -> Self {
        Self {
            service,
            batch_size,
            interval,
        }
    }

    pub fn from_config(service: Arc<RetentionService>, config: &RetentionConfig) -> Self {
        Self::new(service, config.batch_size, config.sweep_interval())
    }

    /// Start sweeping on the current tokio runtime
    ///
    /// The first sweep runs immediately.
    pub fn spawn(self) -> RetentionSweeperHandle {
        let (shutdown_sender, mut shutdown_receiver) = oneshot::channel::<()>();

        info!(
            batch_size = self.batch_size,
            interval_seconds = self.interval.as_secs(),
            "🧹 RETENTION: Starting background sweeper"
        );

        let join_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = &mut shutdown_receiver => {
                        info!("🧹 RETENTION: Sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        match self.service.sweep_retention(self.batch_size).await {
                            Ok(report) => debug!(
                                total_found = report.total_found,
                                neutralized = report.neutralized,
                                failed = report.failed,
                                "Background retention sweep finished"
                            ),
                            Err(err) => log_error("retention", "background_sweep", &err.to_string(), None),
                        }
                    }
                }
            }
        });

        RetentionSweeperHandle {
            shutdown_sender,
            join_handle,
        }
    }
}

pub struct RetentionSweeperHandle {
    shutdown_sender: oneshot::Sender<()>,
    join_handle: JoinHandle<()>,
}

impl RetentionSweeperHandle {
    /// Stop the loop after the sweep in progress, if any, and wait for it
    pub async fn shutdown(self) -> Result<()> {
        // The task may already have exited; nothing left to signal then
        let _ = self.shutdown_sender.send(());
        self.join_handle
            .await
            .map_err(|e| RunLedgerError::Task(format!("retention sweeper task failed: {e}")))
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metadata, NewProcess, NewProcessRun};
    use crate::persistence::{InMemoryRunRepository, RunRepository};
    use crate::state_machine::RunStatus;
    use crate::utils::FixedClock;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_sweeper_neutralizes_then_stops() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let repo = Arc::new(InMemoryRunRepository::new());
        let process = repo.insert_process(NewProcess::new("p"), t0).await.unwrap();
        let run = repo
            .insert_run(NewProcessRun {
                process_id: process.id,
                entity_id: "0101901234".into(),
                entity_name: None,
                meta: Metadata::new(),
                status: RunStatus::Pending,
                scheduled_deletion_at: Some(t0),
                created_at: t0,
                steps: Vec::new(),
            })
            .await
            .unwrap();

        let service = Arc::new(RetentionService::new(repo.clone(), Arc::new(FixedClock::new(t0))));
        let handle = RetentionSweeper::new(service, 10, Duration::from_millis(10)).spawn();

        let mut neutralized = false;
        for _ in 0..100 {
            if repo.find_run(run.id, false).await.unwrap().unwrap().is_neutralized {
                neutralized = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(neutralized);

        handle.shutdown().await.unwrap();
    }
}
