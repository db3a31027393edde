//! Configuration management

use serde::{Deserialize, Serialize};

use crate::constants;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub sync: SyncConfig,
    pub retention: RetentionConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

/// Remote ledger service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub bearer_token: Option<String>,
    /// Substring a scanned payload must contain to be accepted.
    pub domain_marker: String,
    pub timeout_seconds: u64,
    pub bulk_sync_timeout_seconds: u64,
    pub health_timeout_seconds: u64,
    pub max_attempts: u32,
    pub initial_retry_delay_ms: u64,
    pub retry_backoff_multiplier: f64,
    pub max_retry_delay_ms: u64,
    pub max_concurrent_requests: usize,
}

/// Sync engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub batch_limit: usize,
}

/// Local retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    pub max_age_hours: i64,
    pub sweep_interval_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig { path: "veriscan.db".to_string(), pool_size: 8 },
            api: ApiConfig::default(),
            sync: SyncConfig { batch_limit: constants::SYNC_BATCH_LIMIT },
            retention: RetentionConfig {
                max_age_hours: constants::RETENTION_MAX_AGE_HOURS,
                sweep_interval_seconds: constants::RETENTION_SWEEP_INTERVAL_SECS,
            },
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_hours: constants::RETENTION_MAX_AGE_HOURS,
            sweep_interval_seconds: constants::RETENTION_SWEEP_INTERVAL_SECS,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ledger.invalid/api/mobile/v1".to_string(),
            bearer_token: None,
            domain_marker: constants::DEFAULT_DOMAIN_MARKER.to_string(),
            timeout_seconds: constants::DEFAULT_TIMEOUT_SECS,
            bulk_sync_timeout_seconds: constants::BULK_SYNC_TIMEOUT_SECS,
            health_timeout_seconds: constants::HEALTH_TIMEOUT_SECS,
            max_attempts: constants::MAX_ATTEMPTS,
            initial_retry_delay_ms: constants::INITIAL_RETRY_DELAY_MS,
            retry_backoff_multiplier: constants::RETRY_BACKOFF_MULTIPLIER,
            max_retry_delay_ms: constants::MAX_RETRY_DELAY_MS,
            max_concurrent_requests: constants::MAX_CONCURRENT_REQUESTS,
        }
    }
}
