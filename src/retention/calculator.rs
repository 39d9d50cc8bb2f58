use crate::constants::retention::DAYS_PER_RETENTION_MONTH;
use crate::models::Process;
use chrono::{DateTime, Duration, Utc};
use tracing::warn;

/// Compute when a run created at `created_at` becomes due for neutralization
///
/// A missing or non-positive retention period means the run is never
/// neutralized automatically. Months are a fixed 30 days each; this is not
/// calendar month arithmetic. A deadline beyond the representable date range
/// is treated as no deadline.
pub fn compute_scheduled_deletion(
    retention_months: Option<i32>,
    created_at: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let months = retention_months.filter(|months| *months > 0)?;
    let deadline = Duration::try_days(i64::from(months) * DAYS_PER_RETENTION_MONTH)
        .and_then(|period| created_at.checked_add_signed(period));

    if deadline.is_none() {
        warn!(
            retention_months = months,
            created_at = %created_at,
            "Retention deadline out of range; run will not be scheduled"
        );
    }
    deadline
}

/// Retention deadline for a new run of `process`
///
/// Evaluated once at run creation. Later changes to the process's retention
/// period apply to new runs only.
pub fn scheduled_deletion_for(process: &Process, created_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    compute_scheduled_deletion(process.retention_months, created_at)
}
