//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Identity extraction
pub const IDENTITY_PATTERN: &str =
    "[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}";

// Payload validation (substring the scanned URL must contain)
pub const DEFAULT_DOMAIN_MARKER: &str = "services.fne.dgi.gouv.ci";

// Local retention window for pending scans and cached records
pub const RETENTION_MAX_AGE_HOURS: i64 = 24;
pub const RETENTION_SWEEP_INTERVAL_SECS: u64 = 3600;

// Bulk sync (the service rejects larger batches with LIMIT_EXCEEDED)
pub const SYNC_BATCH_LIMIT: usize = 50;

// History pagination cap enforced server-side
pub const HISTORY_PAGE_LIMIT_MAX: u32 = 100;

// Network client defaults
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const BULK_SYNC_TIMEOUT_SECS: u64 = 60;
pub const HEALTH_TIMEOUT_SECS: u64 = 5;
pub const MAX_ATTEMPTS: u32 = 3;
pub const INITIAL_RETRY_DELAY_MS: u64 = 1_000;
pub const RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;
pub const MAX_RETRY_DELAY_MS: u64 = 30_000;
pub const MAX_CONCURRENT_REQUESTS: usize = 5;
