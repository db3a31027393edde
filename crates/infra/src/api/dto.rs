//! Wire types for the ledger service API
//!
//! Every endpoint wraps its payload in [`ApiEnvelope`]. The service emits
//! partial record shapes depending on the endpoint, so all response fields
//! are optional and conversion into domain types fills gaps with defaults.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use veriscan_domain::{RecordState, ScanIdentity, ScanRecord};

/// Standard response wrapper emitted by every endpoint
///
/// `data` may accompany `error`: duplicate rejections ship the existing
/// record alongside the error body.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

/// Error body carried by failed responses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

/* ------------------------------------------------------------------ */
/* Requests                                                           */
/* ------------------------------------------------------------------ */

/// Body for capture endpoints (`scan`, `check`, `report-duplicate`)
#[derive(Debug, Serialize)]
pub struct CaptureRequest<'a> {
    pub qr_url: &'a str,
}

/// Body for the bulk `sync` endpoint
#[derive(Debug, Serialize)]
pub struct SyncRequest {
    pub scans: Vec<SyncScanDto>,
}

#[derive(Debug, Serialize)]
pub struct SyncScanDto {
    pub qr_url: String,
    pub scanned_at: String,
}

/* ------------------------------------------------------------------ */
/* Responses                                                          */
/* ------------------------------------------------------------------ */

/// Scan record as serialized by the service
///
/// Endpoints disagree on which fields they include (the duplicate payload
/// omits `qr_uuid` and `state`, history includes everything), so the whole
/// shape is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanRecordDto {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub qr_uuid: Option<String>,
    #[serde(default)]
    pub supplier_name: Option<String>,
    #[serde(default)]
    pub supplier_code_dgi: Option<String>,
    #[serde(default)]
    pub invoice_number_dgi: Option<String>,
    #[serde(default)]
    pub invoice_date: Option<String>,
    #[serde(default)]
    pub amount_ttc: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub invoice_id: Option<i64>,
    #[serde(default)]
    pub invoice_name: Option<String>,
    #[serde(default)]
    pub scan_date: Option<String>,
    #[serde(default)]
    pub scanned_by: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub duplicate_count: Option<i64>,
    #[serde(default)]
    pub last_duplicate_attempt: Option<String>,
    #[serde(default)]
    pub last_duplicate_user: Option<String>,
}

impl ScanRecordDto {
    /// Identity embedded in the payload itself, when the service sent one
    pub fn identity(&self) -> Option<ScanIdentity> {
        self.qr_uuid.as_deref().and_then(ScanIdentity::extract)
    }

    /// Convert into the cacheable domain record.
    ///
    /// `identity` keys the cache row; callers take it from `qr_uuid` when
    /// present or from the payload they submitted. Missing `state` falls
    /// back to draft, empty strings collapse to `None`.
    pub fn into_record(self, identity: ScanIdentity) -> ScanRecord {
        let state = match self.state.as_deref() {
            None => RecordState::Draft,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(state = raw, "Unknown record state from the ledger service - defaulting to draft");
                RecordState::Draft
            }),
        };

        ScanRecord {
            identity,
            reference: non_empty(self.reference),
            supplier_name: non_empty(self.supplier_name),
            supplier_code: non_empty(self.supplier_code_dgi),
            invoice_number: non_empty(self.invoice_number_dgi),
            invoice_date: self.invoice_date.as_deref().and_then(parse_wire_date),
            amount_ttc: self.amount_ttc,
            currency: non_empty(self.currency).unwrap_or_else(|| "XOF".to_string()),
            state,
            invoice_id: self.invoice_id,
            invoice_name: non_empty(self.invoice_name),
            scanned_by: non_empty(self.scanned_by),
            scan_date: self.scan_date.as_deref().and_then(parse_wire_datetime),
            error_message: non_empty(self.error_message),
            duplicate_count: self.duplicate_count.unwrap_or(0),
            last_duplicate_attempt: self
                .last_duplicate_attempt
                .as_deref()
                .and_then(parse_wire_datetime),
            last_duplicate_user: non_empty(self.last_duplicate_user),
            cached_at: Utc::now(),
        }
    }
}

/// Minimal `{id, reference}` pair returned for freshly created scans
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedRecordDto {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub reference: Option<String>,
}

/// Invoice summary attached to successful scan responses
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceDto {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub amount_total: Option<f64>,
    #[serde(default)]
    pub partner_name: Option<String>,
}

/// Data payload of the `scan` endpoint, covering both outcomes
///
/// Success carries `record` + `invoice`; the duplicate rejection carries
/// `existing_record` + `duplicate_count` next to the error body.
#[derive(Debug, Deserialize)]
pub struct ScanSubmitData {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub record: Option<CreatedRecordDto>,
    #[serde(default)]
    pub invoice: Option<InvoiceDto>,
    #[serde(default)]
    pub existing_record: Option<ScanRecordDto>,
    #[serde(default)]
    pub duplicate_count: Option<i64>,
}

impl ScanSubmitData {
    /// Build the cacheable record for a freshly created scan.
    ///
    /// The service only echoes `{id, reference}` plus the invoice summary
    /// at creation time, so the snapshot is sparse until a history or
    /// duplicate response refreshes it.
    pub fn into_created_record(self, identity: ScanIdentity) -> ScanRecord {
        let mut record = ScanRecord::new(identity, RecordState::Done);
        if let Some(created) = self.record {
            record.reference = non_empty(created.reference);
        }
        if let Some(invoice) = self.invoice {
            record.invoice_id = invoice.id;
            record.invoice_name = non_empty(invoice.name);
            record.supplier_name = non_empty(invoice.partner_name);
            record.amount_ttc = invoice.amount_total;
        }
        record
    }
}

/// Data payload of `report-duplicate`
#[derive(Debug, Deserialize)]
pub struct ReportDuplicateData {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub duplicate_count: Option<i64>,
    #[serde(default)]
    pub record: Option<ScanRecordDto>,
}

/// Data payload of `check`
#[derive(Debug, Deserialize)]
pub struct CheckData {
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub scan_record: Option<ScanRecordDto>,
    #[serde(default)]
    pub qr_uuid: Option<String>,
}

/// Per-item outcome in the bulk sync response
#[derive(Debug, Deserialize)]
pub struct SyncResultDto {
    #[serde(default)]
    pub qr_url: Option<String>,
    #[serde(default)]
    pub scanned_at: Option<String>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub record: Option<CreatedRecordDto>,
    #[serde(default)]
    pub invoice: Option<InvoiceDto>,
    #[serde(default)]
    pub existing_record: Option<ScanRecordDto>,
    #[serde(default)]
    pub duplicate_count: Option<i64>,
}

impl SyncResultDto {
    /// View the per-item payload as submit data, so accepted sync items
    /// synthesize their cache record the same way a direct scan does.
    pub fn into_submit_data(self) -> ScanSubmitData {
        ScanSubmitData {
            message: self.message,
            record: self.record,
            invoice: self.invoice,
            existing_record: self.existing_record,
            duplicate_count: self.duplicate_count,
        }
    }
}

/// Data payload of `sync`
#[derive(Debug, Deserialize)]
pub struct SyncData {
    #[serde(default)]
    pub results: Vec<SyncResultDto>,
    #[serde(default)]
    pub summary: Option<SyncSummaryDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncSummaryDto {
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub successful: i64,
    #[serde(default)]
    pub duplicates: i64,
    #[serde(default)]
    pub errors: i64,
}

/// Data payload of `history`
#[derive(Debug, Deserialize)]
pub struct HistoryData {
    #[serde(default)]
    pub records: Vec<ScanRecordDto>,
    #[serde(default)]
    pub pagination: Option<PaginationDto>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationDto {
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub total_count: i64,
    #[serde(default)]
    pub total_pages: i64,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub has_previous: bool,
}

/// Data payload of `stats`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsData {
    #[serde(default)]
    pub total_scans: i64,
    #[serde(default)]
    pub successful_scans: i64,
    #[serde(default)]
    pub processed_scans: i64,
    #[serde(default)]
    pub unprocessed_scans: i64,
    #[serde(default)]
    pub error_scans: i64,
    #[serde(default)]
    pub duplicate_attempts: i64,
    #[serde(default)]
    pub records_with_duplicates: i64,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Data payload of `mark-processed` / `mark-unprocessed`
#[derive(Debug, Deserialize)]
pub struct RecordActionData {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub record: Option<ScanRecordDto>,
}

/// Data payload of `health`
#[derive(Debug, Deserialize)]
pub struct HealthData {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
}

impl HealthData {
    pub fn is_healthy(&self) -> bool {
        self.status.as_deref() == Some("healthy")
    }
}

/* ------------------------------------------------------------------ */
/* Parsing helpers                                                    */
/* ------------------------------------------------------------------ */

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_wire_date(raw: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            warn!(value = raw, "Unparseable date from the ledger service - dropping it");
            None
        }
    }
}

/// The service emits Python `isoformat()` timestamps, which omit the UTC
/// offset. Try RFC 3339 first, then the naive form interpreted as UTC.
fn parse_wire_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => Some(naive.and_utc()),
        Err(_) => {
            warn!(value = raw, "Unparseable timestamp from the ledger service - dropping it");
            None
        }
    }
}
