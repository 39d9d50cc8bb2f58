#![allow(dead_code)]

use proptest::prelude::*;
use runledger_core::models::{MetaValue, Metadata};
use runledger_core::state_machine::{RunStatus, StepRunStatus};

/// Strategy for generating any step-run status
pub fn step_status_strategy() -> impl Strategy<Value = StepRunStatus> {
    prop_oneof![
        Just(StepRunStatus::Pending),
        Just(StepRunStatus::Running),
        Just(StepRunStatus::Success),
        Just(StepRunStatus::Failed),
        Just(StepRunStatus::Cancelled),
        Just(StepRunStatus::Optional),
    ]
}

/// Strategy for generating the step statuses of one run, including none
pub fn step_statuses_strategy() -> impl Strategy<Value = Vec<StepRunStatus>> {
    prop::collection::vec(step_status_strategy(), 0..12)
}

/// Strategy for generating any run status
pub fn run_status_strategy() -> impl Strategy<Value = RunStatus> {
    prop_oneof![
        Just(RunStatus::Pending),
        Just(RunStatus::Running),
        Just(RunStatus::Completed),
        Just(RunStatus::Failed),
        Just(RunStatus::Cancelled),
    ]
}

/// Strategy for generating scalar metadata values
pub fn meta_value_strategy() -> impl Strategy<Value = MetaValue> {
    prop_oneof![
        Just(MetaValue::Null),
        any::<bool>().prop_map(MetaValue::Bool),
        any::<i64>().prop_map(MetaValue::Integer),
        (-1.0e9f64..1.0e9).prop_map(MetaValue::Float),
        "[a-zA-Z0-9 ]{0,24}".prop_map(MetaValue::String),
    ]
}

/// Strategy for generating run metadata, mixing safe and personal keys
pub fn metadata_strategy() -> impl Strategy<Value = Metadata> {
    let key = prop_oneof![
        Just("department".to_string()),
        Just("category".to_string()),
        Just("status_code".to_string()),
        "[a-z_]{1,16}",
    ];
    prop::collection::btree_map(key, meta_value_strategy(), 0..10)
}
