//! # PostgreSQL Repository
//!
//! SQLx implementation of [`RunRepository`]. Every write opens one transaction
//! and commits the aggregate root together with all of its children. Status
//! enums are stored as lowercase text, JSON columns go through
//! [`sqlx::types::Json`].
//!
//! Queries are checked at runtime rather than with the `query!` macros so the
//! crate builds without a live database.

use super::RunRepository;
use crate::config::DatabaseConfig;
use crate::error::{ResourceKind, Result, RunLedgerError};
use crate::models::metadata::{metadata_from_json, metadata_to_json};
use crate::models::{
    NewProcess, NewProcessRun, NewProcessStep, Process, ProcessRun, ProcessStep, ProcessStepRun,
    RerunConfig,
};
use crate::state_machine::{RunStatus, StepRunStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

const PROCESS_COLUMNS: &str =
    "id, name, meta, retention_months, deleted_at, created_at, updated_at";
const PROCESS_STEP_COLUMNS: &str = r#"id, process_id, "index", name, is_rerunnable, rerun_config, deleted_at, created_at, updated_at"#;
const PROCESS_RUN_COLUMNS: &str = "id, process_id, entity_id, entity_name, meta, status, started_at, \
     finished_at, is_neutralized, scheduled_deletion_at, deleted_at, created_at, updated_at";
const STEP_RUN_COLUMNS: &str = "id, run_id, step_id, step_index, status, started_at, finished_at, \
     failure, can_rerun, rerun_config, rerun_count, max_reruns, deleted_at, created_at, updated_at";

#[derive(Debug, FromRow)]
struct ProcessRow {
    id: i64,
    name: String,
    meta: Json<Value>,
    retention_months: Option<i32>,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProcessRow {
    fn into_process(self, steps: Vec<ProcessStep>) -> Process {
        Process {
            id: self.id,
            name: self.name,
            meta: self.meta.0,
            retention_months: self.retention_months,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            steps,
        }
    }
}

#[derive(Debug, FromRow)]
struct ProcessStepRow {
    id: i64,
    process_id: i64,
    index: i32,
    name: String,
    is_rerunnable: bool,
    rerun_config: Json<RerunConfig>,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProcessStepRow> for ProcessStep {
    fn from(row: ProcessStepRow) -> Self {
        ProcessStep {
            id: row.id,
            process_id: row.process_id,
            index: row.index,
            name: row.name,
            is_rerunnable: row.is_rerunnable,
            rerun_config: row.rerun_config.0,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ProcessRunRow {
    id: i64,
    process_id: i64,
    entity_id: String,
    entity_name: Option<String>,
    meta: Json<Value>,
    status: String,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    is_neutralized: bool,
    scheduled_deletion_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProcessRunRow {
    fn into_run(self, steps: Vec<ProcessStepRun>) -> Result<ProcessRun> {
        Ok(ProcessRun {
            id: self.id,
            process_id: self.process_id,
            entity_id: self.entity_id,
            entity_name: self.entity_name,
            meta: metadata_from_json(&self.meta.0)?,
            status: self.status.parse::<RunStatus>().map_err(RunLedgerError::Database)?,
            started_at: self.started_at,
            finished_at: self.finished_at,
            is_neutralized: self.is_neutralized,
            scheduled_deletion_at: self.scheduled_deletion_at,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            steps,
        })
    }
}

#[derive(Debug, FromRow)]
struct StepRunRow {
    id: i64,
    run_id: i64,
    step_id: i64,
    step_index: i32,
    status: String,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    failure: Option<Json<Value>>,
    can_rerun: bool,
    rerun_config: Json<RerunConfig>,
    rerun_count: i32,
    max_reruns: i32,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StepRunRow> for ProcessStepRun {
    type Error = RunLedgerError;

    fn try_from(row: StepRunRow) -> Result<Self> {
        Ok(ProcessStepRun {
            id: row.id,
            run_id: row.run_id,
            step_id: row.step_id,
            step_index: row.step_index,
            status: row
                .status
                .parse::<StepRunStatus>()
                .map_err(RunLedgerError::Database)?,
            started_at: row.started_at,
            finished_at: row.finished_at,
            failure: row.failure.map(|json| json.0),
            can_rerun: row.can_rerun,
            rerun_config: row.rerun_config.0,
            rerun_count: to_count(row.rerun_count)?,
            max_reruns: to_count(row.max_reruns)?,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn to_count(value: i32) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| RunLedgerError::Database(format!("negative counter value {value}")))
}

fn to_column(value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| RunLedgerError::validation(format!("counter value {value} out of range")))
}

/// Repository backed by a PostgreSQL connection pool
#[derive(Debug, Clone)]
pub struct PgRunRepository {
    pool: PgPool,
}

impl PgRunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(&config.url)
            .await?;

        info!(
            max_connections = config.max_connections,
            "Connected to run ledger database"
        );
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RunLedgerError::Database(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_step_row(
        tx: &mut Transaction<'_, Postgres>,
        process_id: i64,
        step: &NewProcessStep,
        now: DateTime<Utc>,
    ) -> Result<ProcessStep> {
        let sql = format!(
            r#"INSERT INTO process_step (process_id, "index", name, is_rerunnable, rerun_config, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $6)
               RETURNING {PROCESS_STEP_COLUMNS}"#
        );
        let row = sqlx::query_as::<_, ProcessStepRow>(&sql)
            .bind(process_id)
            .bind(step.index)
            .bind(&step.name)
            .bind(step.is_rerunnable)
            .bind(Json(&step.rerun_config))
            .bind(now)
            .fetch_one(&mut **tx)
            .await?;
        Ok(row.into())
    }

    async fn load_steps(&self, process_id: i64) -> Result<Vec<ProcessStep>> {
        let sql = format!(
            r#"SELECT {PROCESS_STEP_COLUMNS} FROM process_step WHERE process_id = $1 ORDER BY "index", id"#
        );
        let rows = sqlx::query_as::<_, ProcessStepRow>(&sql)
            .bind(process_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ProcessStep::from).collect())
    }

    async fn load_step_runs(&self, run_ids: &[i64]) -> Result<HashMap<i64, Vec<ProcessStepRun>>> {
        let sql = format!(
            "SELECT {STEP_RUN_COLUMNS} FROM process_step_run \
             WHERE run_id = ANY($1) ORDER BY run_id, step_index, id"
        );
        let rows = sqlx::query_as::<_, StepRunRow>(&sql)
            .bind(run_ids)
            .fetch_all(&self.pool)
            .await?;

        let mut grouped: HashMap<i64, Vec<ProcessStepRun>> = HashMap::new();
        for row in rows {
            let step_run = ProcessStepRun::try_from(row)?;
            grouped.entry(step_run.run_id).or_default().push(step_run);
        }
        Ok(grouped)
    }

    async fn assemble_runs(&self, rows: Vec<ProcessRunRow>) -> Result<Vec<ProcessRun>> {
        let run_ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let mut step_runs = self.load_step_runs(&run_ids).await?;

        rows.into_iter()
            .map(|row| {
                let steps = step_runs.remove(&row.id).unwrap_or_default();
                row.into_run(steps)
            })
            .collect()
    }
}

#[async_trait]
impl RunRepository for PgRunRepository {
    async fn insert_process(&self, new_process: NewProcess, now: DateTime<Utc>) -> Result<Process> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO process (name, meta, retention_months, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4) RETURNING {PROCESS_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProcessRow>(&sql)
            .bind(&new_process.name)
            .bind(Json(&new_process.meta))
            .bind(new_process.retention_months)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        let mut steps = Vec::with_capacity(new_process.steps.len());
        for step in &new_process.steps {
            steps.push(Self::insert_step_row(&mut tx, row.id, step, now).await?);
        }

        tx.commit().await?;

        let mut process = row.into_process(steps);
        process.sort_steps();
        debug!(process_id = process.id, steps = process.steps.len(), "Inserted process");
        Ok(process)
    }

    async fn insert_process_step(
        &self,
        process_id: i64,
        new_step: NewProcessStep,
        now: DateTime<Utc>,
    ) -> Result<Process> {
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query("UPDATE process SET updated_at = $2 WHERE id = $1")
            .bind(process_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(RunLedgerError::not_found(ResourceKind::Process, process_id));
        }

        Self::insert_step_row(&mut tx, process_id, &new_step, now).await?;
        tx.commit().await?;

        self.find_process(process_id, true)
            .await?
            .ok_or_else(|| RunLedgerError::not_found(ResourceKind::Process, process_id))
    }

    async fn find_process(&self, process_id: i64, include_deleted: bool) -> Result<Option<Process>> {
        let sql = format!(
            "SELECT {PROCESS_COLUMNS} FROM process WHERE id = $1 AND ($2 OR deleted_at IS NULL)"
        );
        let Some(row) = sqlx::query_as::<_, ProcessRow>(&sql)
            .bind(process_id)
            .bind(include_deleted)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let steps = self.load_steps(process_id).await?;
        Ok(Some(row.into_process(steps)))
    }

    async fn save_process(&self, process: &Process) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE process SET name = $2, meta = $3, retention_months = $4, deleted_at = $5, \
             updated_at = $6 WHERE id = $1",
        )
        .bind(process.id)
        .bind(&process.name)
        .bind(Json(&process.meta))
        .bind(process.retention_months)
        .bind(process.deleted_at)
        .bind(process.updated_at)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(RunLedgerError::not_found(ResourceKind::Process, process.id));
        }

        for step in &process.steps {
            sqlx::query(
                r#"UPDATE process_step SET "index" = $3, name = $4, is_rerunnable = $5,
                   rerun_config = $6, deleted_at = $7, updated_at = $8
                   WHERE id = $1 AND process_id = $2"#,
            )
            .bind(step.id)
            .bind(process.id)
            .bind(step.index)
            .bind(&step.name)
            .bind(step.is_rerunnable)
            .bind(Json(&step.rerun_config))
            .bind(step.deleted_at)
            .bind(step.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_run(&self, new_run: NewProcessRun) -> Result<ProcessRun> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO process_run (process_id, entity_id, entity_name, meta, status, \
             scheduled_deletion_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) RETURNING {PROCESS_RUN_COLUMNS}"
        );
        let run_row = sqlx::query_as::<_, ProcessRunRow>(&sql)
            .bind(new_run.process_id)
            .bind(&new_run.entity_id)
            .bind(&new_run.entity_name)
            .bind(Json(metadata_to_json(&new_run.meta)))
            .bind(new_run.status.as_str())
            .bind(new_run.scheduled_deletion_at)
            .bind(new_run.created_at)
            .fetch_one(&mut *tx)
            .await?;

        let step_sql = format!(
            "INSERT INTO process_step_run (run_id, step_id, step_index, status, can_rerun, \
             rerun_config, rerun_count, max_reruns, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $8, $8) RETURNING {STEP_RUN_COLUMNS}"
        );
        let mut steps = Vec::with_capacity(new_run.steps.len());
        for step in &new_run.steps {
            let row = sqlx::query_as::<_, StepRunRow>(&step_sql)
                .bind(run_row.id)
                .bind(step.step_id)
                .bind(step.step_index)
                .bind(StepRunStatus::Pending.as_str())
                .bind(step.can_rerun)
                .bind(Json(&step.rerun_config))
                .bind(to_column(step.max_reruns)?)
                .bind(new_run.created_at)
                .fetch_one(&mut *tx)
                .await?;
            steps.push(ProcessStepRun::try_from(row)?);
        }

        tx.commit().await?;

        let mut run = run_row.into_run(steps)?;
        run.sort_steps();
        debug!(run_id = run.id, steps = run.steps.len(), "Inserted process run");
        Ok(run)
    }

    async fn find_run(&self, run_id: i64, include_deleted: bool) -> Result<Option<ProcessRun>> {
        let sql = format!(
            "SELECT {PROCESS_RUN_COLUMNS} FROM process_run \
             WHERE id = $1 AND ($2 OR deleted_at IS NULL)"
        );
        let Some(row) = sqlx::query_as::<_, ProcessRunRow>(&sql)
            .bind(run_id)
            .bind(include_deleted)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let mut runs = self.assemble_runs(vec![row]).await?;
        Ok(runs.pop())
    }

    async fn find_run_id_for_step_run(&self, step_run_id: i64) -> Result<Option<i64>> {
        let run_id = sqlx::query_scalar::<_, i64>("SELECT run_id FROM process_step_run WHERE id = $1")
            .bind(step_run_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(run_id)
    }

    async fn save_run(&self, run: &ProcessRun) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE process_run SET entity_id = $2, entity_name = $3, meta = $4, status = $5, \
             started_at = $6, finished_at = $7, is_neutralized = $8, scheduled_deletion_at = $9, \
             deleted_at = $10, updated_at = $11 WHERE id = $1",
        )
        .bind(run.id)
        .bind(&run.entity_id)
        .bind(&run.entity_name)
        .bind(Json(metadata_to_json(&run.meta)))
        .bind(run.status.as_str())
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(run.is_neutralized)
        .bind(run.scheduled_deletion_at)
        .bind(run.deleted_at)
        .bind(run.updated_at)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(RunLedgerError::not_found(ResourceKind::ProcessRun, run.id));
        }

        for step_run in &run.steps {
            sqlx::query(
                "UPDATE process_step_run SET status = $3, started_at = $4, finished_at = $5, \
                 failure = $6, can_rerun = $7, rerun_config = $8, rerun_count = $9, \
                 max_reruns = $10, deleted_at = $11, updated_at = $12 \
                 WHERE id = $1 AND run_id = $2",
            )
            .bind(step_run.id)
            .bind(run.id)
            .bind(step_run.status.as_str())
            .bind(step_run.started_at)
            .bind(step_run.finished_at)
            .bind(step_run.failure.as_ref().map(Json))
            .bind(step_run.can_rerun)
            .bind(Json(&step_run.rerun_config))
            .bind(to_column(step_run.rerun_count)?)
            .bind(to_column(step_run.max_reruns)?)
            .bind(step_run.deleted_at)
            .bind(step_run.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_due_runs(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ProcessRun>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT {PROCESS_RUN_COLUMNS} FROM process_run \
             WHERE scheduled_deletion_at <= $1 AND is_neutralized = FALSE AND deleted_at IS NULL \
             ORDER BY scheduled_deletion_at, id LIMIT $2"
        );
        let rows = sqlx::query_as::<_, ProcessRunRow>(&sql)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        self.assemble_runs(rows).await
    }

    async fn find_due_run_ids(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<i64>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM process_run \
             WHERE scheduled_deletion_at <= $1 AND is_neutralized = FALSE AND deleted_at IS NULL \
             ORDER BY scheduled_deletion_at, id LIMIT $2",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn count_due_runs(&self, now: DateTime<Utc>) -> Result<usize> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM process_run \
             WHERE scheduled_deletion_at <= $1 AND is_neutralized = FALSE AND deleted_at IS NULL",
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(usize::try_from(count).unwrap_or_default())
    }
}
