//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! Required for an environment-only load:
//! - `VERISCAN_DB_PATH`: SQLite database file path
//! - `VERISCAN_API_BASE_URL`: Base URL of the ledger service
//!
//! Optional overrides (falling back to the built-in defaults):
//! - `VERISCAN_BEARER_TOKEN`: Session token for authenticated calls
//! - `VERISCAN_DOMAIN_MARKER`: Substring a payload must contain
//! - `VERISCAN_DB_POOL_SIZE`, `VERISCAN_API_TIMEOUT_SECS`,
//!   `VERISCAN_BULK_SYNC_TIMEOUT_SECS`, `VERISCAN_HEALTH_TIMEOUT_SECS`,
//!   `VERISCAN_MAX_ATTEMPTS`, `VERISCAN_INITIAL_RETRY_DELAY_MS`,
//!   `VERISCAN_RETRY_BACKOFF_MULTIPLIER`, `VERISCAN_MAX_RETRY_DELAY_MS`,
//!   `VERISCAN_MAX_CONCURRENT_REQUESTS`, `VERISCAN_SYNC_BATCH_LIMIT`,
//!   `VERISCAN_RETENTION_MAX_AGE_HOURS`,
//!   `VERISCAN_RETENTION_SWEEP_INTERVAL_SECS`
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./veriscan.json` or `./veriscan.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use veriscan_domain::{
    ApiConfig, Config, DatabaseConfig, Result, RetentionConfig, SyncConfig, VeriScanError,
};

/// Load configuration with automatic fallback strategy
///
/// Honors a `.env` file when one exists, then attempts the environment,
/// then probes for a config file. Bearer tokens only come from the
/// environment, never from files.
///
/// # Errors
/// Returns `VeriScanError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            let mut config = load_from_file(None)?;
            if let Ok(token) = std::env::var("VERISCAN_BEARER_TOKEN") {
                config.api.bearer_token = Some(token);
            }
            Ok(config)
        }
    }
}

/// Load configuration from environment variables
///
/// `VERISCAN_DB_PATH` and `VERISCAN_API_BASE_URL` must be present; every
/// other setting falls back to its default when unset.
///
/// # Errors
/// Returns `VeriScanError::Config` if a required variable is missing or
/// any present variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let defaults = Config::default();

    let db_path = env_var("VERISCAN_DB_PATH")?;
    let base_url = env_var("VERISCAN_API_BASE_URL")?;

    Ok(Config {
        database: DatabaseConfig {
            path: db_path,
            pool_size: env_parse("VERISCAN_DB_POOL_SIZE", defaults.database.pool_size)?,
        },
        api: ApiConfig {
            base_url,
            bearer_token: std::env::var("VERISCAN_BEARER_TOKEN").ok(),
            domain_marker: std::env::var("VERISCAN_DOMAIN_MARKER")
                .unwrap_or(defaults.api.domain_marker),
            timeout_seconds: env_parse("VERISCAN_API_TIMEOUT_SECS", defaults.api.timeout_seconds)?,
            bulk_sync_timeout_seconds: env_parse(
                "VERISCAN_BULK_SYNC_TIMEOUT_SECS",
                defaults.api.bulk_sync_timeout_seconds,
            )?,
            health_timeout_seconds: env_parse(
                "VERISCAN_HEALTH_TIMEOUT_SECS",
                defaults.api.health_timeout_seconds,
            )?,
            max_attempts: env_parse("VERISCAN_MAX_ATTEMPTS", defaults.api.max_attempts)?,
            initial_retry_delay_ms: env_parse(
                "VERISCAN_INITIAL_RETRY_DELAY_MS",
                defaults.api.initial_retry_delay_ms,
            )?,
            retry_backoff_multiplier: env_parse(
                "VERISCAN_RETRY_BACKOFF_MULTIPLIER",
                defaults.api.retry_backoff_multiplier,
            )?,
            max_retry_delay_ms: env_parse(
                "VERISCAN_MAX_RETRY_DELAY_MS",
                defaults.api.max_retry_delay_ms,
            )?,
            max_concurrent_requests: env_parse(
                "VERISCAN_MAX_CONCURRENT_REQUESTS",
                defaults.api.max_concurrent_requests,
            )?,
        },
        sync: SyncConfig {
            batch_limit: env_parse("VERISCAN_SYNC_BATCH_LIMIT", defaults.sync.batch_limit)?,
        },
        retention: RetentionConfig {
            max_age_hours: env_parse(
                "VERISCAN_RETENTION_MAX_AGE_HOURS",
                defaults.retention.max_age_hours,
            )?,
            sweep_interval_seconds: env_parse(
                "VERISCAN_RETENTION_SWEEP_INTERVAL_SECS",
                defaults.retention.sweep_interval_seconds,
            )?,
        },
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Arguments
/// * `path` - Optional path to config file. If `None`, uses
///   [`probe_config_paths`].
///
/// # Errors
/// Returns `VeriScanError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(VeriScanError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            VeriScanError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| VeriScanError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `VeriScanError::Config` if format is invalid or parsing fails.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| VeriScanError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| VeriScanError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(VeriScanError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches for config files in the following locations (in order):
/// 1. Current working directory (`./config.{json,toml}`,
///    `./veriscan.{json,toml}`)
/// 2. Parent directories (up to 2 levels)
/// 3. Relative to executable location
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    // Try current working directory
    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("config.json"),
            cwd.join("config.toml"),
            cwd.join("veriscan.json"),
            cwd.join("veriscan.toml"),
            cwd.join("../config.json"),
            cwd.join("../config.toml"),
            cwd.join("../../config.json"),
            cwd.join("../../config.toml"),
        ]);
    }

    // Try relative to executable
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("config.json"),
                exe_dir.join("config.toml"),
                exe_dir.join("veriscan.json"),
                exe_dir.join("veriscan.toml"),
                exe_dir.join("../config.json"),
                exe_dir.join("../config.toml"),
                exe_dir.join("../../config.json"),
                exe_dir.join("../../config.toml"),
            ]);
        }
    }

    // Return first existing candidate
    candidates.into_iter().find(|path| path.exists())
}

/// Get required environment variable
///
/// # Errors
/// Returns `VeriScanError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        VeriScanError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Parse an optional environment variable, falling back to `default`
/// when unset. A present but unparseable value is an error, not a
/// silent fallback.
fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| VeriScanError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}
