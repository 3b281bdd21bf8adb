//! Worker configuration

use std::collections::HashMap;
use std::time::Duration;

use config::{Config, ConfigError, Environment};
use durable_runtime::{ActivityOptions, RetryPolicy};
use infra_db::DatabaseConfig;
use serde::Deserialize;

/// Environment variable prefix, e.g. `BILLING_DATABASE_URL`
pub const ENV_PREFIX: &str = "BILLING";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    Pretty,
    /// One JSON object per event
    Json,
}

/// Worker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Database URL
    pub database_url: String,
    /// Log level or filter directive
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Maximum pool connections
    pub db_max_connections: u32,
    /// Minimum pool connections
    pub db_min_connections: u32,
    /// Pool acquire timeout in seconds
    pub db_acquire_timeout_secs: u64,
    /// Delay after the first failed activity attempt, in milliseconds
    pub retry_initial_interval_ms: u64,
    /// Backoff growth factor
    pub retry_backoff_coefficient: f64,
    /// Backoff cap in seconds
    pub retry_maximum_interval_secs: u64,
    /// Attempts per activity, including the first
    pub retry_max_attempts: u32,
    /// Total time budget per activity in seconds
    pub activity_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/billing".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            db_max_connections: 10,
            db_min_connections: 2,
            db_acquire_timeout_secs: 30,
            retry_initial_interval_ms: 1_000,
            retry_backoff_coefficient: 2.0,
            retry_maximum_interval_secs: 60,
            retry_max_attempts: 5,
            activity_timeout_secs: 300,
        }
    }
}

impl WorkerConfig {
    /// Loads configuration from `BILLING_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::with_prefix(ENV_PREFIX))
    }

    /// Loads configuration from an explicit variable map instead of the process environment
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::load(Environment::with_prefix(ENV_PREFIX).source(Some(vars)))
    }

    fn load(environment: Environment) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Config::builder()
            .set_default("database_url", defaults.database_url)?
            .set_default("log_level", defaults.log_level)?
            .set_default("log_format", "pretty")?
            .set_default("db_max_connections", defaults.db_max_connections)?
            .set_default("db_min_connections", defaults.db_min_connections)?
            .set_default("db_acquire_timeout_secs", defaults.db_acquire_timeout_secs)?
            .set_default("retry_initial_interval_ms", defaults.retry_initial_interval_ms)?
            .set_default("retry_backoff_coefficient", defaults.retry_backoff_coefficient)?
            .set_default("retry_maximum_interval_secs", defaults.retry_maximum_interval_secs)?
            .set_default("retry_max_attempts", defaults.retry_max_attempts)?
            .set_default("activity_timeout_secs", defaults.activity_timeout_secs)?
            .add_source(environment.try_parsing(true))
            .build()?;

        let loaded: WorkerConfig = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_backoff_coefficient < 1.0 {
            return Err(ConfigError::Message(
                "retry_backoff_coefficient must be at least 1.0".to_string(),
            ));
        }
        if self.db_min_connections > self.db_max_connections {
            return Err(ConfigError::Message(
                "db_min_connections exceeds db_max_connections".to_string(),
            ));
        }
        Ok(())
    }

    /// Pool settings for [`infra_db::create_pool`]
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_url.clone())
            .max_connections(self.db_max_connections)
            .min_connections(self.db_min_connections)
            .acquire_timeout(Duration::from_secs(self.db_acquire_timeout_secs))
    }

    /// Retry and timeout settings for bill activities
    pub fn activity_options(&self) -> ActivityOptions {
        ActivityOptions::default()
            .with_timeout(Duration::from_secs(self.activity_timeout_secs))
            .with_retry_policy(RetryPolicy {
                initial_interval: Duration::from_millis(self.retry_initial_interval_ms),
                backoff_coefficient: self.retry_backoff_coefficient,
                maximum_interval: Duration::from_secs(self.retry_maximum_interval_secs),
                maximum_attempts: self.retry_max_attempts,
            })
    }
}
