//! # Structured Logging Module
//!
//! Environment-aware structured logging for the run ledger. Console output is
//! human readable by default and switches to JSON lines when
//! `logging.json = true`.

use crate::config::LoggingConfig;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process
///
/// `RUST_LOG` takes precedence over the configured level, which in turn
/// takes precedence over the environment default.
pub fn init_structured_logging(environment: &str, config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let directive = config
            .level
            .clone()
            .unwrap_or_else(|| default_log_level(environment).to_string());
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

        let layer = if config.json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // An embedding application may already own the global subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %environment,
            level = %directive,
            json = config.json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Default filter directive for an environment
fn default_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log structured data for run operations
pub fn log_run_operation(
    operation: &str,
    run_id: Option<i64>,
    process_id: Option<i64>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        run_id = run_id,
        process_id = process_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 RUN_OPERATION"
    );
}

/// Log structured data for step-run operations
pub fn log_step_run_operation(
    operation: &str,
    run_id: Option<i64>,
    step_run_id: Option<i64>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        run_id = run_id,
        step_run_id = step_run_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🔧 STEP_RUN_OPERATION"
    );
}

/// Log structured data for retention operations
pub fn log_retention_operation(
    operation: &str,
    run_id: Option<i64>,
    total_found: Option<usize>,
    neutralized: Option<usize>,
    failed: Option<usize>,
) {
    tracing::info!(
        operation = %operation,
        run_id = run_id,
        total_found = total_found,
        neutralized = neutralized,
        failed = failed,
        timestamp = %Utc::now().to_rfc3339(),
        "🧹 RETENTION_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
