//! Replays the pending queue against the ledger service
//!
//! One pass drains every unacknowledged capture in batches, applies the
//! per-item verdicts to local state, and prunes acknowledged rows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};
use veriscan_domain::{Result, SyncOutcome, SyncReport, VeriScanError};

use crate::sync::ports::{LedgerGateway, PendingQueue, RecordCache, SyncItem, SyncVerdict};

/// Drains the pending queue once connectivity returns
pub struct SyncEngine {
    queue: Arc<dyn PendingQueue>,
    cache: Arc<dyn RecordCache>,
    gateway: Arc<dyn LedgerGateway>,
    batch_limit: usize,
    in_flight: AtomicBool,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(
        queue: Arc<dyn PendingQueue>,
        cache: Arc<dyn RecordCache>,
        gateway: Arc<dyn LedgerGateway>,
        batch_limit: usize,
    ) -> Self {
        Self { queue, cache, gateway, batch_limit: batch_limit.max(1), in_flight: AtomicBool::new(false) }
    }

    /// Replay all unacknowledged captures
    ///
    /// Only one pass runs at a time; a concurrent call returns
    /// `AlreadyRunning` without touching the queue.
    pub async fn sync_pending(&self) -> Result<SyncReport> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("Sync already in flight, skipping");
            return Ok(SyncReport::AlreadyRunning);
        }
        let result = self.run().await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn run(&self) -> Result<SyncReport> {
        if !self.gateway.health_check().await? {
            info!("Ledger service unreachable, keeping queue intact");
            return Ok(SyncReport::Unreachable);
        }

        let pending = self.queue.list_unsynced().await?;
        if pending.is_empty() {
            return Ok(SyncReport::Completed(SyncOutcome::default()));
        }
        info!(count = pending.len(), "Synchronizing pending captures");

        let mut outcome = SyncOutcome::default();
        for chunk in pending.chunks(self.batch_limit) {
            let items: Vec<SyncItem> = chunk
                .iter()
                .map(|row| SyncItem { payload: row.payload.clone(), captured_at: row.captured_at })
                .collect();
            let verdicts = self.gateway.sync_batch(&items).await?;
            if verdicts.len() != chunk.len() {
                return Err(VeriScanError::Parse(format!(
                    "sync returned {} verdicts for {} items",
                    verdicts.len(),
                    chunk.len()
                )));
            }

            for (row, verdict) in chunk.iter().zip(verdicts) {
                outcome.processed += 1;
                match verdict {
                    SyncVerdict::Accepted { record } => {
                        self.queue.mark_synced(row.id).await?;
                        if let Some(record) = record {
                            self.cache.upsert(&record).await?;
                        }
                        outcome.successful += 1;
                    }
                    SyncVerdict::Duplicate { record } => {
                        self.queue.mark_synced(row.id).await?;
                        if let Some(record) = record {
                            self.cache.upsert(&record).await?;
                        }
                        outcome.duplicates += 1;
                    }
                    SyncVerdict::Rejected { code, reason } => {
                        warn!(row_id = row.id, code = ?code, reason = %reason, "Capture rejected by the ledger");
                        self.queue.mark_failed(row.id, &reason).await?;
                        outcome.failed += 1;
                    }
                }
            }
        }

        let removed = self.queue.delete_synced().await?;
        debug!(removed, "Pruned acknowledged captures");
        info!(
            processed = outcome.processed,
            successful = outcome.successful,
            duplicates = outcome.duplicates,
            failed = outcome.failed,
            "Sync pass complete"
        );
        Ok(SyncReport::Completed(outcome))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use veriscan_domain::{RecordState, SyncState};

    use super::*;
    use crate::test_support::{make_identity, make_payload, make_record, MockCache, MockGateway, MockQueue};

    const MARKER: &str = "service.example";

    async fn seed_pending(queue: &MockQueue, n: u8) {
        for i in 1..=n {
            let identity = make_identity(i);
            queue.seed(&identity, &make_payload(MARKER, &identity)).await;
        }
    }

    fn make_engine(
        queue: Arc<MockQueue>,
        cache: Arc<MockCache>,
        gateway: Arc<MockGateway>,
        batch_limit: usize,
    ) -> SyncEngine {
        SyncEngine::new(queue, cache, gateway, batch_limit)
    }

    #[tokio::test]
    async fn unreachable_service_leaves_the_queue_intact() {
        let queue = Arc::new(MockQueue::new());
        seed_pending(&queue, 2).await;
        let gateway = Arc::new(MockGateway::new().unhealthy());
        let engine =
            make_engine(Arc::clone(&queue), Arc::new(MockCache::new()), Arc::clone(&gateway), 50);

        let report = engine.sync_pending().await.unwrap();

        assert!(matches!(report, SyncReport::Unreachable));
        assert_eq!(queue.rows().await.len(), 2);
        assert!(gateway.batch_calls().await.is_empty());
    }

    #[tokio::test]
    async fn empty_queue_completes_without_network_calls() {
        let gateway = Arc::new(MockGateway::new());
        let engine = make_engine(
            Arc::new(MockQueue::new()),
            Arc::new(MockCache::new()),
            Arc::clone(&gateway),
            50,
        );

        let report = engine.sync_pending().await.unwrap();

        match report {
            SyncReport::Completed(outcome) => assert_eq!(outcome.processed, 0),
            other => panic!("expected Completed, got {other:?}"),
        }
        assert!(gateway.batch_calls().await.is_empty());
    }

    #[tokio::test]
    async fn verdicts_are_applied_per_item() {
        let queue = Arc::new(MockQueue::new());
        seed_pending(&queue, 3).await;
        let cache = Arc::new(MockCache::new());
        let gateway = Arc::new(MockGateway::new());
        gateway
            .push_batch(Ok(vec![
                SyncVerdict::Accepted { record: Some(make_record(&make_identity(1), RecordState::Done)) },
                SyncVerdict::Rejected { code: Some("DGI_ERROR".into()), reason: "Facture inconnue.".into() },
                SyncVerdict::Duplicate { record: Some(make_record(&make_identity(3), RecordState::Done)) },
            ]))
            .await;
        let engine =
            make_engine(Arc::clone(&queue), Arc::clone(&cache), Arc::clone(&gateway), 50);

        let report = engine.sync_pending().await.unwrap();

        match report {
            SyncReport::Completed(outcome) => {
                assert_eq!(outcome.processed, 3);
                assert_eq!(outcome.successful, 1);
                assert_eq!(outcome.duplicates, 1);
                assert_eq!(outcome.failed, 1);
            }
            other => panic!("expected Completed, got {other:?}"),
        }

        // Acknowledged rows are pruned; the rejected one stays with its reason.
        let rows = queue.rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sync_state, SyncState::Failed);
        assert_eq!(rows[0].last_error.as_deref(), Some("Facture inconnue."));
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn rejected_rows_are_retried_on_the_next_pass() {
        let queue = Arc::new(MockQueue::new());
        seed_pending(&queue, 1).await;
        let gateway = Arc::new(MockGateway::new());
        gateway
            .push_batch(Ok(vec![SyncVerdict::Rejected { code: None, reason: "indisponible".into() }]))
            .await;
        let engine =
            make_engine(Arc::clone(&queue), Arc::new(MockCache::new()), Arc::clone(&gateway), 50);

        engine.sync_pending().await.unwrap();
        // Second pass: default verdict acknowledges everything still queued.
        let report = engine.sync_pending().await.unwrap();

        match report {
            SyncReport::Completed(outcome) => {
                assert_eq!(outcome.processed, 1);
                assert_eq!(outcome.successful, 1);
            }
            other => panic!("expected Completed, got {other:?}"),
        }
        assert!(queue.rows().await.is_empty());
        assert_eq!(gateway.batch_calls().await.len(), 2);
    }

    #[tokio::test]
    async fn large_queues_are_drained_in_batches() {
        let queue = Arc::new(MockQueue::new());
        seed_pending(&queue, 5).await;
        let gateway = Arc::new(MockGateway::new());
        let engine =
            make_engine(Arc::clone(&queue), Arc::new(MockCache::new()), Arc::clone(&gateway), 2);

        let report = engine.sync_pending().await.unwrap();

        match report {
            SyncReport::Completed(outcome) => assert_eq!(outcome.processed, 5),
            other => panic!("expected Completed, got {other:?}"),
        }
        let calls = gateway.batch_calls().await;
        let sizes: Vec<usize> = calls.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn verdict_count_mismatch_is_an_error() {
        let queue = Arc::new(MockQueue::new());
        seed_pending(&queue, 2).await;
        let gateway = Arc::new(MockGateway::new());
        gateway.push_batch(Ok(vec![SyncVerdict::Accepted { record: None }])).await;
        let engine =
            make_engine(Arc::clone(&queue), Arc::new(MockCache::new()), gateway, 50);

        let err = engine.sync_pending().await.unwrap_err();

        assert!(matches!(err, VeriScanError::Parse(_)));
        // Nothing was acknowledged, so the next pass sees both rows.
        assert_eq!(queue.rows().await.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_passes_run_single_flight() {
        let queue = Arc::new(MockQueue::new());
        seed_pending(&queue, 1).await;
        let gateway = Arc::new(MockGateway::new().with_batch_delay(Duration::from_millis(100)));
        let engine = Arc::new(make_engine(
            Arc::clone(&queue),
            Arc::new(MockCache::new()),
            Arc::clone(&gateway),
            50,
        ));

        let first = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.sync_pending().await.unwrap() }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = engine.sync_pending().await.unwrap();

        assert!(matches!(second, SyncReport::AlreadyRunning));
        assert!(matches!(first.await.unwrap(), SyncReport::Completed(_)));
        assert_eq!(gateway.batch_calls().await.len(), 1);
    }

    #[tokio::test]
    async fn gateway_failure_releases_the_single_flight_guard() {
        let queue = Arc::new(MockQueue::new());
        seed_pending(&queue, 1).await;
        let gateway = Arc::new(MockGateway::new());
        gateway.push_batch(Err(VeriScanError::Timeout("60s elapsed".into()))).await;
        let engine =
            make_engine(Arc::clone(&queue), Arc::new(MockCache::new()), Arc::clone(&gateway), 50);

        assert!(engine.sync_pending().await.is_err());
        // The guard was released; a second pass proceeds normally.
        let report = engine.sync_pending().await.unwrap();
        assert!(matches!(report, SyncReport::Completed(_)));
    }
}
