//! # Retention Sweep
//!
//! Command-line entry point for scheduled retention runs (cron, Kubernetes
//! CronJob). Runs one sweep against the configured database and prints the
//! report as JSON.

use anyhow::Context;
use clap::Parser;
use runledger_core::config::ConfigManager;
use runledger_core::logging::init_structured_logging;
use runledger_core::persistence::PgRunRepository;
use runledger_core::retention::RetentionService;
use runledger_core::utils::SystemClock;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "retention-sweep")]
#[command(about = "Neutralize personal data on runs past their retention period")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration directory (default: $RUNLEDGER_CONFIG_DIR or ./config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Environment to load (default: $RUNLEDGER_ENV, $APP_ENV or development)
    #[arg(short, long)]
    env: Option<String>,

    /// Maximum runs to neutralize in this sweep (default: retention.batch_size)
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Report how many runs are due instead of neutralizing them
    #[arg(long)]
    stats: bool,

    /// Apply pending schema migrations before running
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let environment = cli.env.unwrap_or_else(ConfigManager::detect_environment);
    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir, &environment)
        .context("failed to load configuration")?;
    let config = manager.config();

    init_structured_logging(manager.environment(), &config.logging);

    config
        .database
        .validate()
        .context("database configuration is incomplete")?;
    let repository = PgRunRepository::connect(&config.database)
        .await
        .context("failed to connect to the database")?;
    if cli.migrate {
        repository.migrate().await.context("failed to apply migrations")?;
    }

    let service = RetentionService::from_config(
        Arc::new(repository),
        Arc::new(SystemClock),
        &config.retention,
    );

    let output = if cli.stats {
        let stats = service.retention_stats(None).await?;
        serde_json::to_string_pretty(&stats)?
    } else {
        let batch_size = cli.batch_size.unwrap_or(config.retention.batch_size);
        info!(batch_size = batch_size, "🧹 RETENTION: Running sweep");
        let report = service.sweep_retention(batch_size).await?;
        serde_json::to_string_pretty(&report)?
    };

    println!("{output}");
    Ok(())
}
