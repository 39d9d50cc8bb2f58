use super::RunRepository;
use crate::error::{ResourceKind, Result, RunLedgerError};
use crate::models::{
    NewProcess, NewProcessRun, NewProcessStep, Process, ProcessRun, ProcessStep, ProcessStepRun,
};
use crate::state_machine::StepRunStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
struct Arena {
    processes: BTreeMap<i64, Process>,
    runs: BTreeMap<i64, ProcessRun>,
    step_run_owner: HashMap<i64, i64>,
    next_process_id: i64,
    next_step_id: i64,
    next_run_id: i64,
    next_step_run_id: i64,
}

impl Arena {
    fn next(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn build_step(&mut self, process_id: i64, new_step: NewProcessStep, now: DateTime<Utc>) -> ProcessStep {
        ProcessStep {
            id: Self::next(&mut self.next_step_id),
            process_id,
            index: new_step.index,
            name: new_step.name,
            is_rerunnable: new_step.is_rerunnable,
            rerun_config: new_step.rerun_config,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Repository keeping every aggregate in memory
///
/// Each method takes the arena lock exactly once, so every write is
/// all-or-nothing with respect to concurrent readers.
#[derive(Debug, Default)]
pub struct InMemoryRunRepository {
    arena: RwLock<Arena>,
}

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_count(&self) -> usize {
        self.arena.read().runs.len()
    }
}

#[async_trait]
impl RunRepository for InMemoryRunRepository {
    async fn insert_process(&self, new_process: NewProcess, now: DateTime<Utc>) -> Result<Process> {
        let mut arena = self.arena.write();
        let process_id = Arena::next(&mut arena.next_process_id);

        let steps = new_process
            .steps
            .into_iter()
            .map(|step| arena.build_step(process_id, step, now))
            .collect();

        let mut process = Process {
            id: process_id,
            name: new_process.name,
            meta: new_process.meta,
            retention_months: new_process.retention_months,
            deleted_at: None,
            created_at: now,
            updated_at: now,
            steps,
        };
        process.sort_steps();

        arena.processes.insert(process_id, process.clone());
        Ok(process)
    }

    async fn insert_process_step(
        &self,
        process_id: i64,
        new_step: NewProcessStep,
        now: DateTime<Utc>,
    ) -> Result<Process> {
        let mut arena = self.arena.write();
        if !arena.processes.contains_key(&process_id) {
            return Err(RunLedgerError::not_found(ResourceKind::Process, process_id));
        }

        let step = arena.build_step(process_id, new_step, now);
        let process = arena
            .processes
            .get_mut(&process_id)
            .ok_or_else(|| RunLedgerError::not_found(ResourceKind::Process, process_id))?;
        process.steps.push(step);
        process.sort_steps();
        process.updated_at = now;

        Ok(process.clone())
    }

    async fn find_process(&self, process_id: i64, include_deleted: bool) -> Result<Option<Process>> {
        let arena = self.arena.read();
        Ok(arena
            .processes
            .get(&process_id)
            .filter(|process| include_deleted || !process.is_deleted())
            .cloned())
    }

    async fn save_process(&self, process: &Process) -> Result<()> {
        let mut arena = self.arena.write();
        let slot = arena
            .processes
            .get_mut(&process.id)
            .ok_or_else(|| RunLedgerError::not_found(ResourceKind::Process, process.id))?;
        *slot = process.clone();
        slot.sort_steps();
        Ok(())
    }

    async fn insert_run(&self, new_run: NewProcessRun) -> Result<ProcessRun> {
        let mut arena = self.arena.write();
        if !arena.processes.contains_key(&new_run.process_id) {
            return Err(RunLedgerError::not_found(
                ResourceKind::Process,
                new_run.process_id,
            ));
        }

        let run_id = Arena::next(&mut arena.next_run_id);
        let created_at = new_run.created_at;

        let mut steps = Vec::with_capacity(new_run.steps.len());
        for new_step_run in new_run.steps {
            let step_run_id = Arena::next(&mut arena.next_step_run_id);
            arena.step_run_owner.insert(step_run_id, run_id);
            steps.push(ProcessStepRun {
                id: step_run_id,
                run_id,
                step_id: new_step_run.step_id,
                step_index: new_step_run.step_index,
                status: StepRunStatus::Pending,
                started_at: None,
                finished_at: None,
                failure: None,
                can_rerun: new_step_run.can_rerun,
                rerun_config: new_step_run.rerun_config,
                rerun_count: 0,
                max_reruns: new_step_run.max_reruns,
                deleted_at: None,
                created_at,
                updated_at: created_at,
            });
        }

        let mut run = ProcessRun {
            id: run_id,
            process_id: new_run.process_id,
            entity_id: new_run.entity_id,
            entity_name: new_run.entity_name,
            meta: new_run.meta,
            status: new_run.status,
            started_at: None,
            finished_at: None,
            is_neutralized: false,
            scheduled_deletion_at: new_run.scheduled_deletion_at,
            deleted_at: None,
            created_at,
            updated_at: created_at,
            steps,
        };
        run.sort_steps();

        arena.runs.insert(run_id, run.clone());
        Ok(run)
    }

    async fn find_run(&self, run_id: i64, include_deleted: bool) -> Result<Option<ProcessRun>> {
        let arena = self.arena.read();
        Ok(arena
            .runs
            .get(&run_id)
            .filter(|run| include_deleted || !run.is_deleted())
            .cloned())
    }

    async fn find_run_id_for_step_run(&self, step_run_id: i64) -> Result<Option<i64>> {
        Ok(self.arena.read().step_run_owner.get(&step_run_id).copied())
    }

    async fn save_run(&self, run: &ProcessRun) -> Result<()> {
        let mut arena = self.arena.write();
        let slot = arena
            .runs
            .get_mut(&run.id)
            .ok_or_else(|| RunLedgerError::not_found(ResourceKind::ProcessRun, run.id))?;
        *slot = run.clone();
        slot.sort_steps();
        Ok(())
    }

    async fn find_due_runs(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ProcessRun>> {
        let arena = self.arena.read();
        let mut due: Vec<&ProcessRun> = arena
            .runs
            .values()
            .filter(|run| run.is_due_for_neutralization(now))
            .collect();
        due.sort_by_key(|run| (run.scheduled_deletion_at, run.id));

        Ok(due.into_iter().take(limit).cloned().collect())
    }

    async fn find_due_run_ids(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<i64>> {
        let arena = self.arena.read();
        let mut due: Vec<(Option<DateTime<Utc>>, i64)> = arena
            .runs
            .values()
            .filter(|run| run.is_due_for_neutralization(now))
            .map(|run| (run.scheduled_deletion_at, run.id))
            .collect();
        due.sort_unstable();

        Ok(due.into_iter().take(limit).map(|(_, id)| id).collect())
    }

    async fn count_due_runs(&self, now: DateTime<Utc>) -> Result<usize> {
        let arena = self.arena.read();
        Ok(arena
            .runs
            .values()
            .filter(|run| run.is_due_for_neutralization(now))
            .count())
    }
}
