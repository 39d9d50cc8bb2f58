//! Configuration Loader
//!
//! Environment-aware layered loading built on the `config` crate. Files are
//! optional; a missing directory yields the built-in defaults.

use super::error::{ConfigResult, ConfigurationError};
use super::RunLedgerConfig;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CONFIG_FILE_STEM: &str = "runledger";
const ENV_PREFIX: &str = "RUNLEDGER";
const ENV_SEPARATOR: &str = "__";

pub struct ConfigManager {
    config: RunLedgerConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    ///
    /// Useful in tests that must not touch process-wide environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = environment,
            directory = %config_directory.display(),
            "Loading configuration"
        );

        let config = Self::load_layers(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = environment,
            batch_size = config.retention.batch_size,
            sweep_enabled = config.retention.sweep_enabled,
            rerun_adapter = ?config.rerun.adapter,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    pub fn config(&self) -> &RunLedgerConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// `RUNLEDGER_ENV`, then `APP_ENV`, defaulting to `development`
    pub fn detect_environment() -> String {
        env::var("RUNLEDGER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        env::var("RUNLEDGER_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn load_layers(config_directory: &Path, environment: &str) -> ConfigResult<RunLedgerConfig> {
        let load_error = |e: config::ConfigError| ConfigurationError::load_error(environment, e);

        let defaults = Config::try_from(&RunLedgerConfig::default()).map_err(load_error)?;
        let base_file = config_directory.join(format!("{CONFIG_FILE_STEM}.toml"));
        let env_file = config_directory.join(format!("{CONFIG_FILE_STEM}.{environment}.toml"));

        Config::builder()
            .add_source(defaults)
            .add_source(File::from(base_file).required(false))
            .add_source(File::from(env_file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .list_separator(",")
                    .with_list_parse_key("retention.safe_metadata_keys")
                    .try_parsing(true),
            )
            .set_override("environment", environment)
            .map_err(load_error)?
            .build()
            .map_err(load_error)?
            .try_deserialize::<RunLedgerConfig>()
            .map_err(load_error)
    }
}
