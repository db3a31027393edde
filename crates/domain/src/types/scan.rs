//! Pending queue entries and cached scan records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_status_conversions;
use crate::types::identity::ScanIdentity;

/// Sync lifecycle of a locally captured scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Unsynced,
    Synced,
    Failed,
}

impl_status_conversions!(SyncState {
    Unsynced => "unsynced",
    Synced => "synced",
    Failed => "failed",
});

/// A capture recorded locally but not yet acknowledged by the ledger service
///
/// Created by the orchestrator when a capture happens offline. The sync
/// engine owns its state transitions; rows leave the queue on successful
/// acknowledgment or age-based purge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingScan {
    pub id: i64,
    pub identity: ScanIdentity,
    pub payload: String,
    pub captured_at: DateTime<Utc>,
    pub sync_state: SyncState,
    pub last_error: Option<String>,
}

/// Lifecycle state of a scan record on the ledger service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Draft,
    Done,
    Processed,
    Error,
    Cancelled,
}

impl_status_conversions!(RecordState {
    Draft => "draft",
    Done => "done",
    Processed => "processed",
    Error => "error",
    Cancelled => "cancelled",
});

impl RecordState {
    /// A processed record has been posted to accounting and can no longer
    /// be resubmitted.
    pub fn is_finalized(self) -> bool {
        matches!(self, Self::Processed)
    }

    /// Display label shown to agents.
    pub fn label(self) -> &'static str {
        match self {
            Self::Draft => "Brouillon",
            Self::Done => "Scanné",
            Self::Processed => "Traité",
            Self::Error => "Erreur",
            Self::Cancelled => "Annulé",
        }
    }
}

/// Denormalized snapshot of a server-confirmed scan record
///
/// Cached locally keyed by identity so repeated captures of the same
/// invoice resolve without a network round-trip. Upserts are
/// last-write-wins; the server copy is always authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub identity: ScanIdentity,
    pub reference: Option<String>,
    pub supplier_name: Option<String>,
    pub supplier_code: Option<String>,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub amount_ttc: Option<f64>,
    pub currency: String,
    pub state: RecordState,
    pub invoice_id: Option<i64>,
    pub invoice_name: Option<String>,
    pub scanned_by: Option<String>,
    pub scan_date: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub duplicate_count: i64,
    pub last_duplicate_attempt: Option<DateTime<Utc>>,
    pub last_duplicate_user: Option<String>,
    pub cached_at: DateTime<Utc>,
}

impl ScanRecord {
    /// Minimal record with every optional field empty.
    pub fn new(identity: ScanIdentity, state: RecordState) -> Self {
        Self {
            identity,
            reference: None,
            supplier_name: None,
            supplier_code: None,
            invoice_number: None,
            invoice_date: None,
            amount_ttc: None,
            currency: "XOF".to_string(),
            state,
            invoice_id: None,
            invoice_name: None,
            scanned_by: None,
            scan_date: None,
            error_message: None,
            duplicate_count: 0,
            last_duplicate_attempt: None,
            last_duplicate_user: None,
            cached_at: Utc::now(),
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.state.is_finalized()
    }
}
