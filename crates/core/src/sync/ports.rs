//! Port interfaces for queue, cache, and ledger access
//!
//! These traits define the boundaries between core business logic
//! and infrastructure implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use veriscan_domain::{PendingScan, Result, ScanIdentity, ScanRecord};

/// Durable write-ahead queue of captures awaiting acknowledgment
#[async_trait]
pub trait PendingQueue: Send + Sync {
    /// Append a capture recorded offline; returns the stored row
    async fn append(
        &self,
        identity: &ScanIdentity,
        payload: &str,
        captured_at: DateTime<Utc>,
    ) -> Result<PendingScan>;

    /// Rows not yet acknowledged (never sent or previously rejected),
    /// oldest first so replay preserves capture order
    async fn list_unsynced(&self) -> Result<Vec<PendingScan>>;

    /// Point lookup for a not-yet-acknowledged row by identity
    async fn find_unsynced(&self, identity: &ScanIdentity) -> Result<Option<PendingScan>>;

    /// Mark a row acknowledged; calling twice is a no-op
    async fn mark_synced(&self, id: i64) -> Result<()>;

    /// Mark a row rejected, keeping the server's reason; calling twice is a
    /// no-op
    async fn mark_failed(&self, id: i64, reason: &str) -> Result<()>;

    /// Remove acknowledged rows; returns how many were deleted
    async fn delete_synced(&self) -> Result<usize>;

    /// Remove rows captured before the cutoff regardless of sync state
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Read-through cache of server-confirmed scan records keyed by identity
#[async_trait]
pub trait RecordCache: Send + Sync {
    /// Point lookup by identity
    async fn find(&self, identity: &ScanIdentity) -> Result<Option<ScanRecord>>;

    /// Last-write-wins upsert keyed by identity
    async fn upsert(&self, record: &ScanRecord) -> Result<()>;

    /// Remove records cached before the cutoff
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Business outcome of submitting one capture to the ledger service
///
/// Duplicates are verdicts, not errors; transport and server failures
/// travel as `Err`.
#[derive(Debug, Clone)]
pub enum SubmitVerdict {
    /// The service created a new scan record
    Created { record: ScanRecord },
    /// The service already knows this capture
    Duplicate { record: Option<ScanRecord>, duplicate_count: i64 },
}

/// One pending capture in a bulk sync request
#[derive(Debug, Clone)]
pub struct SyncItem {
    pub payload: String,
    pub captured_at: DateTime<Utc>,
}

/// Per-item verdict from a bulk sync response, in request order
#[derive(Debug, Clone)]
pub enum SyncVerdict {
    /// Recorded on the ledger
    Accepted { record: Option<ScanRecord> },
    /// Already known to the ledger; counts as acknowledged
    Duplicate { record: Option<ScanRecord> },
    /// Refused; the row stays queued with the reason attached
    Rejected { code: Option<String>, reason: String },
}

impl SyncVerdict {
    /// Acknowledged items leave the queue; rejected items stay
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, Self::Accepted { .. } | Self::Duplicate { .. })
    }
}

/// Typed access to the remote ledger service
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Submit one capture
    async fn submit_capture(&self, payload: &str) -> Result<SubmitVerdict>;

    /// Report a duplicate observation so the server can count it; returns
    /// the updated record
    async fn report_duplicate(&self, payload: &str) -> Result<ScanRecord>;

    /// Submit a chunk of pending captures; verdicts come back in request
    /// order
    async fn sync_batch(&self, items: &[SyncItem]) -> Result<Vec<SyncVerdict>>;

    /// Probe service reachability; an unreachable service is `Ok(false)`,
    /// not an error
    async fn health_check(&self) -> Result<bool>;
}
