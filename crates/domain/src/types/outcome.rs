//! Results surfaced to callers by the orchestrator and sync engine

use serde::{Deserialize, Serialize};

use crate::errors::VeriScanError;
use crate::types::scan::ScanRecord;

/// Terminal classification of one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    Success,
    Duplicate,
    AlreadyFinalized,
    Failed,
}

/// What the presentation layer consumes for every submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResult {
    pub status: SubmitStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<ScanRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl SubmitResult {
    pub fn success(message: impl Into<String>, record: Option<ScanRecord>) -> Self {
        Self { status: SubmitStatus::Success, message: message.into(), record, error_code: None }
    }

    /// Duplicate outcome; classifies as `AlreadyFinalized` when the known
    /// record has been posted to accounting.
    pub fn duplicate(message: impl Into<String>, record: Option<ScanRecord>) -> Self {
        let finalized = record.as_ref().is_some_and(ScanRecord::is_finalized);
        Self {
            status: if finalized {
                SubmitStatus::AlreadyFinalized
            } else {
                SubmitStatus::Duplicate
            },
            message: message.into(),
            record,
            error_code: None,
        }
    }

    /// Fold a taxonomy error into the presentation shape.
    pub fn failure(error: &VeriScanError) -> Self {
        Self {
            status: SubmitStatus::Failed,
            message: error.user_message(),
            record: None,
            error_code: Some(error.code().to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SubmitStatus::Success
    }
}

/// Per-run counters produced by the sync engine, never persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub processed: usize,
    pub successful: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// Result of one `sync_pending` invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncReport {
    /// Another sync run is in flight; nothing was attempted.
    AlreadyRunning,
    /// The service failed its health probe; the queue was not touched.
    Unreachable,
    Completed(SyncOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::identity::ScanIdentity;
    use crate::types::scan::RecordState;

    fn record(state: RecordState) -> ScanRecord {
        let identity =
            ScanIdentity::extract("019bd62c-467e-7000-82ac-45c8389c7f05").unwrap();
        ScanRecord::new(identity, state)
    }

    #[test]
    fn test_duplicate_classification_follows_record_state() {
        let open = SubmitResult::duplicate("déjà scannée", Some(record(RecordState::Done)));
        assert_eq!(open.status, SubmitStatus::Duplicate);

        let finalized =
            SubmitResult::duplicate("déjà traitée", Some(record(RecordState::Processed)));
        assert_eq!(finalized.status, SubmitStatus::AlreadyFinalized);

        // Queue hits carry no record and stay plain duplicates
        let queued = SubmitResult::duplicate("déjà en attente", None);
        assert_eq!(queued.status, SubmitStatus::Duplicate);
    }

    #[test]
    fn test_failure_preserves_error_code() {
        let err = VeriScanError::Server {
            code: "DGI_ERROR".into(),
            message: "Vérification indisponible".into(),
        };
        let result = SubmitResult::failure(&err);
        assert_eq!(result.status, SubmitStatus::Failed);
        assert_eq!(result.error_code.as_deref(), Some("DGI_ERROR"));
        assert_eq!(result.message, "Vérification indisponible");
        assert!(!result.is_success());
    }

    #[test]
    fn test_sync_report_serde_shape() {
        let report = SyncReport::Completed(SyncOutcome {
            processed: 3,
            successful: 2,
            duplicates: 0,
            failed: 1,
        });
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"status\":\"completed\""));
        assert!(json.contains("\"processed\":3"));

        let idle = serde_json::to_string(&SyncReport::AlreadyRunning).unwrap();
        assert!(idle.contains("already_running"));
    }
}
