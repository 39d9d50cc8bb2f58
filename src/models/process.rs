//! # Process Model
//!
//! Reusable process definitions and their ordered step templates.
//!
//! A `Process` exclusively owns its `ProcessStep` templates, kept sorted by
//! `index`. Steps reference their process by id only. Runs are created from a
//! snapshot of the non-deleted templates and the retention policy at that
//! moment; later changes to the process never touch existing runs.
//!
//! ## Database Schema
//!
//! Maps to the `process` and `process_step` tables:
//! ```sql
//! CREATE TABLE process (
//!   id BIGSERIAL PRIMARY KEY,
//!   name VARCHAR(255) NOT NULL,
//!   meta JSONB NOT NULL DEFAULT '{}',
//!   retention_months INTEGER,
//!   deleted_at TIMESTAMPTZ,
//!   -- ... timestamps
//! );
//! ```

use super::metadata::RunMetadataSchema;
use crate::constants::RUN_METADATA_SCHEMA_KEY;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Rerun configuration carried by a step template and copied onto its step-runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RerunConfig {
    /// Maximum reruns allowed for step-runs created from this template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Adapter-specific parameters (for example a work item reference)
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl RerunConfig {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries: Some(max_retries),
            params: Map::new(),
        }
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.max_retries.is_none() && self.params.is_empty()
    }
}

/// A step template within a process definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStep {
    pub id: i64,
    pub process_id: i64,
    pub index: i32,
    pub name: String,
    pub is_rerunnable: bool,
    pub rerun_config: RerunConfig,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessStep {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// New ProcessStep for creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProcessStep {
    pub index: i32,
    pub name: String,
    #[serde(default)]
    pub is_rerunnable: bool,
    #[serde(default)]
    pub rerun_config: RerunConfig,
}

impl NewProcessStep {
    pub fn new(index: i32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            is_rerunnable: false,
            rerun_config: RerunConfig::default(),
        }
    }

    pub fn rerunnable(mut self, rerun_config: RerunConfig) -> Self {
        self.is_rerunnable = true;
        self.rerun_config = rerun_config;
        self
    }
}

/// A process definition together with its step templates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub id: i64,
    pub name: String,
    pub meta: Value,
    /// Months before runs are neutralized; `None` means never
    pub retention_months: Option<i32>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Step templates ordered by `index`
    pub steps: Vec<ProcessStep>,
}

impl Process {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Templates that new runs are instantiated from, in execution order
    pub fn active_steps(&self) -> impl Iterator<Item = &ProcessStep> {
        self.steps.iter().filter(|step| !step.is_deleted())
    }

    pub fn step(&self, step_id: i64) -> Option<&ProcessStep> {
        self.steps.iter().find(|step| step.id == step_id)
    }

    pub fn rerunnable_steps(&self) -> impl Iterator<Item = &ProcessStep> {
        self.active_steps().filter(|step| step.is_rerunnable)
    }

    /// Declared run metadata fields, if the process metadata carries a schema
    pub fn run_metadata_schema(&self) -> Option<RunMetadataSchema> {
        let schema = self.meta.get(RUN_METADATA_SCHEMA_KEY)?.as_object()?;
        Some(
            schema
                .iter()
                .filter_map(|(field, ty)| ty.as_str().map(|t| (field.clone(), t.to_string())))
                .collect(),
        )
    }

    pub(crate) fn sort_steps(&mut self) {
        self.steps.sort_by_key(|step| (step.index, step.id));
    }
}

/// New Process for creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProcess {
    pub name: String,
    #[serde(default = "empty_object")]
    pub meta: Value,
    #[serde(default)]
    pub retention_months: Option<i32>,
    #[serde(default)]
    pub steps: Vec<NewProcessStep>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl NewProcess {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            meta: empty_object(),
            retention_months: None,
            steps: Vec::new(),
        }
    }

    pub fn with_retention_months(mut self, months: i32) -> Self {
        self.retention_months = Some(months);
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_step(mut self, step: NewProcessStep) -> Self {
        self.steps.push(step);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn process_with_meta(meta: Value) -> Process {
        let now = Utc::now();
        Process {
            id: 1,
            name: "Onboarding".into(),
            meta,
            retention_months: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
            steps: Vec::new(),
        }
    }

    #[test]
    fn test_rerun_config_flattens_params() {
        let config: RerunConfig =
            serde_json::from_value(json!({"max_retries": 5, "workitem_id": "wi-1"})).unwrap();
        assert_eq!(config.max_retries, Some(5));
        assert_eq!(config.param("workitem_id"), Some(&json!("wi-1")));

        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back, json!({"max_retries": 5, "workitem_id": "wi-1"}));
    }

    #[test]
    fn test_run_metadata_schema_is_read_from_meta() {
        let process = process_with_meta(json!({
            "owner": "team-a",
            "run_metadata_schema": {"department": "string", "amount": "number"}
        }));

        let schema = process.run_metadata_schema().unwrap();
        assert_eq!(schema.get("department").map(String::as_str), Some("string"));
        assert_eq!(schema.len(), 2);

        assert!(process_with_meta(json!({})).run_metadata_schema().is_none());
    }
}
