//! Test fixtures wiring the services to an in-memory repository and a fixed clock.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use runledger_core::adapters::{DisabledRerunAdapter, RerunAdapter};
use runledger_core::models::{
    Metadata, NewProcess, NewProcessStep, Process, ProcessRun, ProcessStepRun, RerunConfig, RunInput,
};
use runledger_core::persistence::{InMemoryRunRepository, RunRepository};
use runledger_core::retention::RetentionService;
use runledger_core::services::{ProcessRunService, ProcessService};
use runledger_core::state_machine::{RunStatus, StepRunStatus};
use runledger_core::utils::FixedClock;
use std::sync::Arc;

pub fn jan_first_2024() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// All services sharing one repository and one clock
pub struct TestLedger {
    pub repository: Arc<dyn RunRepository>,
    pub clock: Arc<FixedClock>,
    pub processes: ProcessService,
    pub runs: ProcessRunService,
    pub retention: RetentionService,
}

impl TestLedger {
    pub fn new() -> Self {
        Self::with_repository(Arc::new(InMemoryRunRepository::new()))
    }

    pub fn with_repository(repository: Arc<dyn RunRepository>) -> Self {
        Self::build(repository, Arc::new(DisabledRerunAdapter))
    }

    pub fn with_adapter(adapter: Arc<dyn RerunAdapter>) -> Self {
        Self::build(Arc::new(InMemoryRunRepository::new()), adapter)
    }

    fn build(repository: Arc<dyn RunRepository>, adapter: Arc<dyn RerunAdapter>) -> Self {
        let clock = Arc::new(FixedClock::new(jan_first_2024()));
        Self {
            processes: ProcessService::new(repository.clone(), clock.clone()),
            runs: ProcessRunService::new(repository.clone(), adapter, clock.clone()),
            retention: RetentionService::new(repository.clone(), clock.clone()),
            repository,
            clock,
        }
    }

    pub async fn start_run(&self, process: &Process, entity_id: &str) -> ProcessRun {
        self.runs
            .create_run_with_steps(process.id, RunInput::new(entity_id))
            .await
            .expect("Failed to create test run")
    }
}

/// Builder pattern for creating test processes
pub struct ProcessBuilder {
    name: String,
    retention_months: Option<i32>,
    steps: Vec<NewProcessStep>,
}

impl ProcessBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            retention_months: None,
            steps: Vec::new(),
        }
    }

    pub fn with_retention_months(mut self, months: i32) -> Self {
        self.retention_months = Some(months);
        self
    }

    pub fn with_steps(mut self, count: usize) -> Self {
        for _ in 0..count {
            let index = self.steps.len() as i32;
            self.steps.push(NewProcessStep::new(index, format!("step-{index}")));
        }
        self
    }

    pub fn with_rerunnable_step(mut self, max_retries: Option<u32>) -> Self {
        let index = self.steps.len() as i32;
        let config = match max_retries {
            Some(max) => RerunConfig::with_max_retries(max),
            None => RerunConfig::default(),
        };
        self.steps
            .push(NewProcessStep::new(index, format!("rerunnable-{index}")).rerunnable(config));
        self
    }

    pub async fn build(self, ledger: &TestLedger) -> Process {
        let mut new_process = NewProcess::new(self.name);
        new_process.retention_months = self.retention_months;
        new_process.steps = self.steps;

        ledger
            .processes
            .create_process(new_process)
            .await
            .expect("Failed to create test process")
    }
}

/// Detached run with one step-run per status, for exercising pure logic
pub fn run_with_statuses(status: RunStatus, statuses: &[StepRunStatus]) -> ProcessRun {
    let steps = statuses
        .iter()
        .enumerate()
        .map(|(i, step_status)| step_run(i as i64 + 1, *step_status))
        .collect();

    ProcessRun {
        id: 1,
        process_id: 1,
        entity_id: "0101901234".to_string(),
        entity_name: Some("Jane Doe".to_string()),
        meta: Metadata::new(),
        status,
        started_at: None,
        finished_at: None,
        is_neutralized: false,
        scheduled_deletion_at: None,
        deleted_at: None,
        created_at: jan_first_2024(),
        updated_at: jan_first_2024(),
        steps,
    }
}

/// Detached rerunnable step-run
pub fn step_run(id: i64, status: StepRunStatus) -> ProcessStepRun {
    ProcessStepRun {
        id,
        run_id: 1,
        step_id: id,
        step_index: (id - 1) as i32,
        status,
        started_at: None,
        finished_at: None,
        failure: None,
        can_rerun: true,
        rerun_config: RerunConfig::default(),
        rerun_count: 0,
        max_reruns: 3,
        deleted_at: None,
        created_at: jan_first_2024(),
        updated_at: jan_first_2024(),
    }
}
