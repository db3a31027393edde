//! Scan submission orchestrator
//!
//! Classifies each captured payload as new, duplicate, or failed, and
//! routes it to the ledger service or the local pending queue depending
//! on connectivity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use veriscan_domain::{Result, ScanIdentity, ScanRecord, SubmitResult, VeriScanError};

use crate::sync::ports::{LedgerGateway, PendingQueue, RecordCache, SubmitVerdict};

const MSG_ALREADY_PROCESSED: &str = "Cette facture a déjà été traitée.";
const MSG_ALREADY_SCANNED: &str = "Cette facture a déjà été scannée.";
const MSG_ALREADY_QUEUED: &str = "Cette facture est déjà en attente de synchronisation.";
const MSG_CREATED: &str = "Facture créée avec succès.";
const MSG_QUEUED: &str = "Facture enregistrée localement. Synchronisation en attente.";

/// Orchestrates a single capture from raw payload to verdict
///
/// Lookups run local-first: the record cache answers for captures the
/// server already confirmed, the pending queue for captures waiting to
/// be replayed. Only a genuinely new capture reaches the network.
pub struct ScanService {
    queue: Arc<dyn PendingQueue>,
    cache: Arc<dyn RecordCache>,
    gateway: Arc<dyn LedgerGateway>,
    domain_marker: String,
    identity_locks: DashMap<String, Arc<Mutex<()>>>,
    duplicate_hits: AtomicU64,
}

impl ScanService {
    /// Create a new scan service
    pub fn new(
        queue: Arc<dyn PendingQueue>,
        cache: Arc<dyn RecordCache>,
        gateway: Arc<dyn LedgerGateway>,
        domain_marker: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            cache,
            gateway,
            domain_marker: domain_marker.into(),
            identity_locks: DashMap::new(),
            duplicate_hits: AtomicU64::new(0),
        }
    }

    /// Submit one captured payload
    ///
    /// Never returns `Err`: failures fold into a `SubmitResult` carrying
    /// the taxonomy code and a user-facing message.
    pub async fn submit(&self, raw_payload: &str, is_online: bool) -> SubmitResult {
        match self.submit_inner(raw_payload, is_online).await {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, category = err.category(), "Scan submission failed");
                SubmitResult::failure(&err)
            }
        }
    }

    /// Duplicate captures detected locally since startup
    pub fn duplicate_hits(&self) -> u64 {
        self.duplicate_hits.load(Ordering::Relaxed)
    }

    async fn submit_inner(&self, raw_payload: &str, is_online: bool) -> Result<SubmitResult> {
        let payload = raw_payload.trim();
        if !payload.contains(&self.domain_marker) {
            return Err(VeriScanError::Validation(format!(
                "payload does not carry the expected verification domain '{}'",
                self.domain_marker
            )));
        }
        let identity = ScanIdentity::extract(payload).ok_or_else(|| {
            VeriScanError::Validation("payload carries no invoice token".into())
        })?;

        // One in-flight submission per identity; distinct invoices
        // proceed in parallel.
        let lock = self
            .identity_locks
            .entry(identity.as_str().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if let Some(record) = self.cache.find(&identity).await? {
            self.duplicate_hits.fetch_add(1, Ordering::Relaxed);
            debug!(identity = %identity, "Capture already confirmed by the ledger");
            if is_online {
                self.spawn_duplicate_report(payload.to_string());
            }
            let message =
                if record.is_finalized() { MSG_ALREADY_PROCESSED } else { MSG_ALREADY_SCANNED };
            return Ok(SubmitResult::duplicate(message, Some(record)));
        }

        if self.queue.find_unsynced(&identity).await?.is_some() {
            self.duplicate_hits.fetch_add(1, Ordering::Relaxed);
            debug!(identity = %identity, "Capture already queued locally");
            return Ok(SubmitResult::duplicate(MSG_ALREADY_QUEUED, None));
        }

        if is_online {
            self.submit_online(&identity, payload).await
        } else {
            self.queue_offline(&identity, payload).await
        }
    }

    async fn submit_online(&self, identity: &ScanIdentity, payload: &str) -> Result<SubmitResult> {
        match self.gateway.submit_capture(payload).await? {
            SubmitVerdict::Created { record } => {
                self.cache.upsert(&record).await?;
                info!(identity = %identity, "Scan recorded by the ledger");
                Ok(SubmitResult::success(MSG_CREATED, Some(record)))
            }
            SubmitVerdict::Duplicate { record, duplicate_count } => {
                if let Some(ref known) = record {
                    self.cache.upsert(known).await?;
                }
                info!(identity = %identity, duplicate_count, "Ledger reports an existing record");
                let finalized = record.as_ref().is_some_and(ScanRecord::is_finalized);
                let message = if finalized { MSG_ALREADY_PROCESSED } else { MSG_ALREADY_SCANNED };
                Ok(SubmitResult::duplicate(message, record))
            }
        }
    }

    async fn queue_offline(&self, identity: &ScanIdentity, payload: &str) -> Result<SubmitResult> {
        let row = self.queue.append(identity, payload, Utc::now()).await?;
        info!(identity = %identity, row_id = row.id, "Capture queued for later synchronization");
        Ok(SubmitResult::success(MSG_QUEUED, None))
    }

    /// Tell the ledger a confirmed capture was scanned again
    ///
    /// Runs detached; the audit trail must never delay or fail the
    /// submission verdict.
    fn spawn_duplicate_report(&self, payload: String) {
        let gateway = Arc::clone(&self.gateway);
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            match gateway.report_duplicate(&payload).await {
                Ok(record) => {
                    if let Err(err) = cache.upsert(&record).await {
                        debug!(error = %err, "Failed to refresh cache after duplicate report");
                    }
                }
                Err(err) => {
                    debug!(error = %err, "Duplicate report not delivered");
                }
            }
        });
    }
}
