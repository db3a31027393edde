//! Bulkhead pattern for limiting concurrent operations
//!
//! The bulkhead caps the number of operations in flight at once. Named
//! after ship bulkheads that contain flooding to specific compartments,
//! it keeps a burst of requests from exhausting sockets or saturating a
//! slow remote service.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Errors produced while acquiring a bulkhead slot
#[derive(Debug, Error)]
pub enum BulkheadError {
    #[error("timed out after {timeout:?} waiting for a bulkhead slot")]
    AcquireTimeout { timeout: Duration },

    #[error("bulkhead is closed")]
    Closed,
}

/// Configuration for bulkhead behavior
#[derive(Debug, Clone)]
pub struct BulkheadConfig {
    /// Maximum number of concurrent operations allowed
    pub max_concurrent: usize,
    /// Optional timeout for acquiring a slot; `None` waits indefinitely
    pub acquire_timeout: Option<Duration>,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self { max_concurrent: 5, acquire_timeout: None }
    }
}

impl BulkheadConfig {
    /// Create a new configuration builder
    pub fn builder() -> BulkheadConfigBuilder {
        BulkheadConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent == 0 {
            return Err("max_concurrent must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Builder for BulkheadConfig
#[derive(Debug)]
pub struct BulkheadConfigBuilder {
    config: BulkheadConfig,
}

impl Default for BulkheadConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BulkheadConfigBuilder {
    pub fn new() -> Self {
        Self { config: BulkheadConfig::default() }
    }

    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.config.max_concurrent = max;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquire_timeout = Some(timeout);
        self
    }

    pub fn no_timeout(mut self) -> Self {
        self.config.acquire_timeout = None;
        self
    }

    pub fn build(self) -> Result<BulkheadConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Snapshot of bulkhead activity
#[derive(Debug, Clone)]
pub struct BulkheadMetrics {
    /// Total number of slots handed out
    pub total_admitted: u64,
    /// Total number of timeouts waiting for a slot
    pub timeout_count: u64,
    /// Current number of operations holding a slot
    pub in_flight: usize,
    /// Maximum concurrent operations allowed
    pub max_concurrent: usize,
}

impl BulkheadMetrics {
    /// Current utilization as a fraction (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        self.in_flight as f64 / self.max_concurrent as f64
    }

    /// Whether every slot is taken
    pub fn is_at_capacity(&self) -> bool {
        self.in_flight >= self.max_concurrent
    }
}

/// RAII guard for one bulkhead slot, released on drop
#[derive(Debug)]
pub struct BulkheadPermit {
    _permit: OwnedSemaphorePermit,
}

/// Admission gate bounding concurrent operations
///
/// Callers acquire a permit before touching the shared resource and hold
/// it for the whole operation. When every slot is taken, `acquire` waits
/// until one frees or the configured timeout elapses.
pub struct Bulkhead {
    config: BulkheadConfig,
    semaphore: Arc<Semaphore>,
    total_admitted: Arc<AtomicU64>,
    timeout_count: Arc<AtomicU64>,
}

impl Bulkhead {
    /// Create a new bulkhead with the given configuration
    pub fn new(config: BulkheadConfig) -> Self {
        config.validate().expect("Invalid bulkhead configuration");

        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            total_admitted: Arc::new(AtomicU64::new(0)),
            timeout_count: Arc::new(AtomicU64::new(0)),
            config,
        }
    }

    /// Create a bulkhead with default configuration
    pub fn with_defaults() -> Self {
        Self::new(BulkheadConfig::default())
    }

    /// Try to acquire a slot without waiting
    ///
    /// Returns `None` when the gate is at capacity.
    pub fn try_acquire(&self) -> Option<BulkheadPermit> {
        Arc::clone(&self.semaphore).try_acquire_owned().ok().map(|permit| {
            self.total_admitted.fetch_add(1, Ordering::Relaxed);
            BulkheadPermit { _permit: permit }
        })
    }

    /// Acquire a slot, waiting if necessary
    ///
    /// Honors the configured `acquire_timeout`; without one, waits until a
    /// slot frees.
    pub async fn acquire(&self) -> Result<BulkheadPermit, BulkheadError> {
        let semaphore = Arc::clone(&self.semaphore);
        let permit = match self.config.acquire_timeout {
            Some(timeout) => {
                match tokio::time::timeout(timeout, semaphore.acquire_owned()).await {
                    Ok(Ok(permit)) => permit,
                    Ok(Err(_)) => return Err(BulkheadError::Closed),
                    Err(_) => {
                        self.timeout_count.fetch_add(1, Ordering::Relaxed);
                        debug!(?timeout, "Bulkhead acquire timed out");
                        return Err(BulkheadError::AcquireTimeout { timeout });
                    }
                }
            }
            None => semaphore.acquire_owned().await.map_err(|_| BulkheadError::Closed)?,
        };

        self.total_admitted.fetch_add(1, Ordering::Relaxed);
        Ok(BulkheadPermit { _permit: permit })
    }

    /// Current number of operations holding a slot
    pub fn in_flight(&self) -> usize {
        self.config.max_concurrent.saturating_sub(self.semaphore.available_permits())
    }

    /// Get bulkhead metrics
    pub fn metrics(&self) -> BulkheadMetrics {
        BulkheadMetrics {
            total_admitted: self.total_admitted.load(Ordering::Acquire),
            timeout_count: self.timeout_count.load(Ordering::Acquire),
            in_flight: self.in_flight(),
            max_concurrent: self.config.max_concurrent,
        }
    }
}

impl Clone for Bulkhead {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            semaphore: Arc::clone(&self.semaphore),
            total_admitted: Arc::clone(&self.total_admitted),
            timeout_count: Arc::clone(&self.timeout_count),
        }
    }
}

impl fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bulkhead")
            .field("max_concurrent", &self.config.max_concurrent)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bulkhead_basic_acquire_release() {
        let bulkhead = Bulkhead::with_defaults();

        {
            let _permit = bulkhead.acquire().await.unwrap();
            assert_eq!(bulkhead.in_flight(), 1);
        }
        assert_eq!(bulkhead.in_flight(), 0);
        assert_eq!(bulkhead.metrics().total_admitted, 1);
    }

    #[tokio::test]
    async fn test_bulkhead_try_acquire_at_capacity() {
        let config = BulkheadConfig::builder().max_concurrent(1).build().unwrap();
        let bulkhead = Bulkhead::new(config);

        let held = bulkhead.try_acquire();
        assert!(held.is_some());
        assert!(bulkhead.try_acquire().is_none());

        drop(held);
        assert!(bulkhead.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_bulkhead_acquire_timeout() {
        let config = BulkheadConfig::builder()
            .max_concurrent(1)
            .acquire_timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let bulkhead = Bulkhead::new(config);

        let _held = bulkhead.acquire().await.unwrap();

        let result = bulkhead.acquire().await;
        assert!(matches!(result, Err(BulkheadError::AcquireTimeout { .. })));
        assert_eq!(bulkhead.metrics().timeout_count, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_bulkhead_blocks_until_slot_frees() {
        let config = BulkheadConfig::builder().max_concurrent(1).no_timeout().build().unwrap();
        let bulkhead = Arc::new(Bulkhead::new(config));

        let held = bulkhead.acquire().await.unwrap();

        let waiter = {
            let bulkhead = Arc::clone(&bulkhead);
            tokio::spawn(async move {
                let _permit = bulkhead.acquire().await.unwrap();
            })
        };

        // The waiter cannot finish while the slot is held
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }

    #[test]
    fn test_bulkhead_config_validation() {
        assert!(BulkheadConfig::builder().max_concurrent(0).build().is_err());
        assert!(BulkheadConfig::builder().max_concurrent(1).build().is_ok());
    }

    #[test]
    fn test_bulkhead_metrics_methods() {
        let metrics = BulkheadMetrics {
            total_admitted: 10,
            timeout_count: 2,
            in_flight: 5,
            max_concurrent: 5,
        };

        assert_eq!(metrics.utilization(), 1.0);
        assert!(metrics.is_at_capacity());
    }
}
