//! # Run Ledger Configuration
//!
//! Typed configuration for the run ledger core, loaded in layers by
//! [`ConfigManager`]:
//!
//! 1. built-in defaults
//! 2. `<dir>/runledger.toml`
//! 3. `<dir>/runledger.<environment>.toml`
//! 4. `RUNLEDGER__*` environment variables (`RUNLEDGER__RETENTION__BATCH_SIZE=50`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use runledger_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let batch_size = manager.config().retention.batch_size;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::adapters::RerunAdapterKind;
use crate::constants::retention::{
    DEFAULT_BATCH_SIZE, DEFAULT_SAFE_METADATA_KEYS, DEFAULT_SWEEP_INTERVAL_SECONDS,
};
use crate::constants::DEFAULT_MAX_RERUNS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunLedgerConfig {
    pub environment: String,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub retention: RetentionConfig,
    pub rerun: RerunSettings,
}

impl Default for RunLedgerConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            retention: RetentionConfig::default(),
            rerun: RerunSettings::default(),
        }
    }
}

impl RunLedgerConfig {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Validate settings that every deployment needs, database or not
    pub fn validate(&self) -> ConfigResult<()> {
        if self.environment.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "environment",
                "root configuration",
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                "0",
                "pool size must be greater than 0",
            ));
        }

        if self.retention.batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "retention.batch_size",
                "0",
                "batch size must be greater than 0",
            ));
        }

        if self.retention.sweep_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "retention.sweep_interval_seconds",
                "0",
                "sweep interval must be greater than 0",
            ));
        }

        if let Some(blank) = self
            .retention
            .safe_metadata_keys
            .iter()
            .find(|key| key.trim().is_empty())
        {
            return Err(ConfigurationError::invalid_value(
                "retention.safe_metadata_keys",
                blank.clone(),
                "metadata keys must not be blank",
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            acquire_timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    /// Checked before opening a pool; the in-memory repository needs no URL
    pub fn validate(&self) -> ConfigResult<()> {
        if self.url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "database.url",
                "database configuration",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive; `RUST_LOG` wins when set
    pub level: Option<String>,
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub batch_size: usize,
    pub sweep_enabled: bool,
    pub sweep_interval_seconds: u64,
    /// Metadata keys kept verbatim during neutralization
    pub safe_metadata_keys: Vec<String>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            sweep_enabled: false,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
            safe_metadata_keys: DEFAULT_SAFE_METADATA_KEYS
                .iter()
                .map(|key| key.to_string())
                .collect(),
        }
    }
}

impl RetentionConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerunSettings {
    pub adapter: RerunAdapterKind,
    /// Used when a rerunnable template sets no `max_retries`
    pub default_max_reruns: u32,
}

impl Default for RerunSettings {
    fn default() -> Self {
        Self {
            adapter: RerunAdapterKind::Disabled,
            default_max_reruns: DEFAULT_MAX_RERUNS,
        }
    }
}
