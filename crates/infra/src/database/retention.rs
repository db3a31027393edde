//! Retention sweeper for local storage
//!
//! Both local collections hold reconciliation state, not an archive. The
//! sweeper removes anything older than the retention window on a periodic
//! schedule, with explicit lifecycle management.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use veriscan_core::{PendingQueue, RecordCache};
use veriscan_domain::{RetentionConfig, Result, VeriScanError};

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Statistics from one retention pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionStats {
    pub pending_deleted: usize,
    pub records_deleted: usize,
    pub duration_secs: f64,
}

/// Background retention sweeper with lifecycle management
pub struct RetentionSweeper {
    queue: Arc<dyn PendingQueue>,
    cache: Arc<dyn RecordCache>,
    max_age_hours: i64,
    sweep_interval: Duration,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl RetentionSweeper {
    /// Create a new retention sweeper
    pub fn new(
        queue: Arc<dyn PendingQueue>,
        cache: Arc<dyn RecordCache>,
        config: &RetentionConfig,
    ) -> Self {
        Self {
            queue,
            cache,
            max_age_hours: config.max_age_hours,
            sweep_interval: Duration::from_secs(config.sweep_interval_seconds),
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the background sweep loop
    ///
    /// # Errors
    ///
    /// Returns error if the sweeper is already running
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running().await {
            return Err(VeriScanError::Config("Retention sweeper already running".into()));
        }

        info!(max_age_hours = self.max_age_hours, "Starting retention sweeper");

        // Create a new cancellation token (supports restart after stop)
        self.cancellation_token = CancellationToken::new();

        let queue = Arc::clone(&self.queue);
        let cache = Arc::clone(&self.cache);
        let max_age_hours = self.max_age_hours;
        let interval = self.sweep_interval;
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::sweep_loop(queue, cache, max_age_hours, interval, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);

        Ok(())
    }

    /// Stop the sweeper gracefully
    ///
    /// # Errors
    ///
    /// Returns error if the sweeper is not running
    pub async fn stop(&mut self) -> Result<()> {
        if !self.is_running().await {
            return Err(VeriScanError::Config("Retention sweeper not running".into()));
        }

        info!("Stopping retention sweeper");

        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!("Retention task panicked: {}", err);
                    return Err(VeriScanError::Internal(format!(
                        "Retention task panicked: {err}"
                    )));
                }
                Err(_) => {
                    warn!("Retention task did not complete within timeout");
                    return Err(VeriScanError::Timeout("retention task shutdown".into()));
                }
            }
        }

        info!("Retention sweeper stopped");

        Ok(())
    }

    /// Check if the sweeper is running
    pub async fn is_running(&self) -> bool {
        let guard = self.task_handle.lock().await;
        guard.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Run one retention pass immediately
    ///
    /// Hosts run this at process start; the background loop only fires
    /// after its first interval.
    ///
    /// # Errors
    ///
    /// Returns error if either purge fails
    pub async fn purge_once(&self) -> Result<RetentionStats> {
        Self::run_purge(&self.queue, &self.cache, self.max_age_hours).await
    }

    async fn run_purge(
        queue: &Arc<dyn PendingQueue>,
        cache: &Arc<dyn RecordCache>,
        max_age_hours: i64,
    ) -> Result<RetentionStats> {
        let start = std::time::Instant::now();
        let cutoff = Utc::now() - chrono::Duration::hours(max_age_hours);

        let pending_deleted = queue.purge_older_than(cutoff).await?;
        let records_deleted = cache.purge_older_than(cutoff).await?;
        let duration_secs = start.elapsed().as_secs_f64();

        info!(
            pending = pending_deleted,
            records = records_deleted,
            duration_secs,
            "Retention pass completed"
        );

        Ok(RetentionStats { pending_deleted, records_deleted, duration_secs })
    }

    async fn sweep_loop(
        queue: Arc<dyn PendingQueue>,
        cache: Arc<dyn RecordCache>,
        max_age_hours: i64,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Retention loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    match Self::run_purge(&queue, &cache, max_age_hours).await {
                        Ok(stats) => {
                            debug!(
                                pending = stats.pending_deleted,
                                records = stats.records_deleted,
                                "Periodic retention pass completed"
                            );
                        }
                        Err(err) => {
                            warn!(error = %err, "Periodic retention pass failed");
                        }
                    }
                }
            }
        }
    }
}

/// Ensure the sweeper is stopped when dropped
impl Drop for RetentionSweeper {
    fn drop(&mut self) {
        // Best-effort cleanup; the handle cannot be awaited here
        if !self.cancellation_token.is_cancelled() {
            warn!("RetentionSweeper dropped while running; cancelling");
            self.cancellation_token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;
    use veriscan_domain::ScanIdentity;

    use super::*;
    use crate::database::{DbManager, SqlitePendingQueue, SqliteRecordCache};

    #[tokio::test(flavor = "multi_thread")]
    async fn lifecycle_start_and_stop() {
        let (mut sweeper, _temp_dir) = setup_sweeper().await;

        assert!(!sweeper.is_running().await);

        sweeper.start().await.expect("sweeper starts");
        assert!(sweeper.is_running().await);

        sweeper.stop().await.expect("sweeper stops");
        assert!(!sweeper.is_running().await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn double_start_fails() {
        let (mut sweeper, _temp_dir) = setup_sweeper().await;

        sweeper.start().await.expect("first start succeeds");
        assert!(sweeper.start().await.is_err());

        sweeper.stop().await.expect("stop succeeds");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn purge_once_removes_expired_data() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager = Arc::new(DbManager::new(temp_dir.path().join("test.db"), 4).unwrap());
        manager.run_migrations().unwrap();

        let queue = Arc::new(SqlitePendingQueue::new(Arc::clone(&manager)));
        let cache = Arc::new(SqliteRecordCache::new(Arc::clone(&manager)));

        let now = Utc::now();
        queue
            .append(&test_identity(1), "old", now - ChronoDuration::hours(25))
            .await
            .unwrap();
        queue
            .append(&test_identity(2), "fresh", now - ChronoDuration::hours(1))
            .await
            .unwrap();

        let config = RetentionConfig::default();
        let sweeper = RetentionSweeper::new(queue.clone(), cache, &config);

        let stats = sweeper.purge_once().await.expect("purge succeeds");
        assert_eq!(stats.pending_deleted, 1);
        assert_eq!(stats.records_deleted, 0);

        let remaining = queue.list_unsynced().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].payload, "fresh");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancellation_stops_the_loop() {
        let (mut sweeper, _temp_dir) = setup_sweeper().await;

        sweeper.start().await.expect("start succeeds");

        sweeper.cancellation_token.cancel();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(!sweeper.is_running().await);
    }

    async fn setup_sweeper() -> (RetentionSweeper, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager = Arc::new(DbManager::new(temp_dir.path().join("test.db"), 4).unwrap());
        manager.run_migrations().unwrap();

        let queue = Arc::new(SqlitePendingQueue::new(Arc::clone(&manager)));
        let cache = Arc::new(SqliteRecordCache::new(manager));
        let config = RetentionConfig {
            max_age_hours: 24,
            sweep_interval_seconds: 3600,
        };

        (RetentionSweeper::new(queue, cache, &config), temp_dir)
    }

    fn test_identity(n: u8) -> ScanIdentity {
        let token = format!("{n:08x}-0000-7000-8000-000000000000");
        ScanIdentity::extract(&token).expect("test identity is canonical")
    }
}
