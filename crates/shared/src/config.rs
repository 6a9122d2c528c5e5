//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Outbox relay configuration.
    #[serde(default)]
    pub outbox: OutboxConfig,
    /// Saga retry configuration.
    #[serde(default)]
    pub saga: SagaConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Outbox relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OutboxConfig {
    /// How often the relay polls for unpublished events, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum events fetched per drain pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    /// Publish attempts before an event is moved to the dead letter queue.
    #[serde(default = "default_max_publish_attempts")]
    pub max_publish_attempts: i32,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            batch_size: default_batch_size(),
            max_publish_attempts: default_max_publish_attempts(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_batch_size() -> u64 {
    100
}

fn default_max_publish_attempts() -> i32 {
    10
}

/// Saga retry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SagaConfig {
    /// Maximum forward attempts per step before compensation starts.
    #[serde(default = "default_max_step_attempts")]
    pub max_step_attempts: u32,
    /// Base backoff delay between retries, in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Ceiling on the backoff delay, in milliseconds.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// How often the worker sweeps for stalled sagas, in milliseconds.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            max_step_attempts: default_max_step_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

fn default_max_step_attempts() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    200
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_sweep_interval_ms() -> u64 {
    60_000
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("TRELLIS").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbox_defaults() {
        let cfg = OutboxConfig::default();
        assert_eq!(cfg.poll_interval_ms, 1_000);
        assert_eq!(cfg.batch_size, 100);
        assert_eq!(cfg.max_publish_attempts, 10);
    }

    #[test]
    fn test_saga_defaults() {
        let cfg = SagaConfig::default();
        assert_eq!(cfg.max_step_attempts, 5);
        assert!(cfg.backoff_base_ms < cfg.backoff_max_ms);
    }
}
