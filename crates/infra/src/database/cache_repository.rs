//! SQLite-backed implementation of the record cache port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row, ToSql};
use tokio::task;
use tracing::warn;
use veriscan_core::RecordCache;
use veriscan_domain::{RecordState, Result as DomainResult, ScanIdentity, ScanRecord, VeriScanError};

use super::manager::{DbConnection, DbManager};
use crate::errors::InfraError;

/// SQLite-backed scan record cache.
pub struct SqliteRecordCache {
    db: Arc<DbManager>,
}

impl SqliteRecordCache {
    /// Construct a repository backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn upsert_row(conn: &DbConnection, record: &ScanRecord) -> DomainResult<()> {
        let identity = record.identity.as_str();
        let invoice_date = record.invoice_date.map(|date| date.to_string());
        let state = record.state.to_string();
        let scan_date = record.scan_date.map(|ts| ts.timestamp());
        let last_duplicate_attempt = record.last_duplicate_attempt.map(|ts| ts.timestamp());
        let cached_at = record.cached_at.timestamp();

        let params: [&dyn ToSql; 18] = [
            &identity,
            &record.reference,
            &record.supplier_name,
            &record.supplier_code,
            &record.invoice_number,
            &invoice_date,
            &record.amount_ttc,
            &record.currency,
            &state,
            &record.invoice_id,
            &record.invoice_name,
            &record.scanned_by,
            &scan_date,
            &record.error_message,
            &record.duplicate_count,
            &last_duplicate_attempt,
            &record.last_duplicate_user,
            &cached_at,
        ];

        conn.execute(RECORD_UPSERT_SQL, params.as_slice()).map_err(map_sql_error).map(|_| ())
    }
}

#[async_trait]
impl RecordCache for SqliteRecordCache {
    async fn find(&self, identity: &ScanIdentity) -> DomainResult<Option<ScanRecord>> {
        let db = Arc::clone(&self.db);
        let identity = identity.as_str().to_string();

        task::spawn_blocking(move || -> DomainResult<Option<ScanRecord>> {
            let conn = db.get_connection()?;
            conn.query_row(RECORD_FIND_SQL, params![identity], map_record_row)
                .optional()
                .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn upsert(&self, record: &ScanRecord) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let record = record.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            Self::upsert_row(&conn, &record)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> DomainResult<usize> {
        let db = Arc::clone(&self.db);
        let cutoff = cutoff.timestamp();

        task::spawn_blocking(move || -> DomainResult<usize> {
            let conn = db.get_connection()?;
            conn.execute(RECORD_PURGE_SQL, params![cutoff]).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

const RECORD_UPSERT_SQL: &str = "INSERT OR REPLACE INTO scan_records (
        identity, reference, supplier_name, supplier_code, invoice_number, invoice_date,
        amount_ttc, currency, state, invoice_id, invoice_name, scanned_by, scan_date,
        error_message, duplicate_count, last_duplicate_attempt, last_duplicate_user, cached_at
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18
    )";

const RECORD_FIND_SQL: &str = "SELECT
        identity, reference, supplier_name, supplier_code, invoice_number, invoice_date,
        amount_ttc, currency, state, invoice_id, invoice_name, scanned_by, scan_date,
        error_message, duplicate_count, last_duplicate_attempt, last_duplicate_user, cached_at
    FROM scan_records
    WHERE identity = ?1";

const RECORD_PURGE_SQL: &str = "DELETE FROM scan_records WHERE cached_at < ?1";

fn map_record_row(row: &Row<'_>) -> rusqlite::Result<ScanRecord> {
    let identity_raw: String = row.get(0)?;
    let identity = ScanIdentity::extract(&identity_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            "stored identity is not a valid token".into(),
        )
    })?;

    let invoice_date: Option<String> = row.get(5)?;
    let state_raw: String = row.get(8)?;
    let scan_date: Option<i64> = row.get(12)?;
    let last_duplicate_attempt: Option<i64> = row.get(15)?;
    let cached_at: i64 = row.get(17)?;

    let cached_at = DateTime::from_timestamp(cached_at, 0).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            17,
            rusqlite::types::Type::Integer,
            "timestamp out of range".into(),
        )
    })?;

    Ok(ScanRecord {
        identity: identity.clone(),
        reference: row.get(1)?,
        supplier_name: row.get(2)?,
        supplier_code: row.get(3)?,
        invoice_number: row.get(4)?,
        invoice_date: invoice_date.and_then(|raw| parse_date(&identity, &raw)),
        amount_ttc: row.get(6)?,
        currency: row.get(7)?,
        state: parse_record_state(&identity, &state_raw),
        invoice_id: row.get(9)?,
        invoice_name: row.get(10)?,
        scanned_by: row.get(11)?,
        scan_date: scan_date.and_then(|secs| DateTime::from_timestamp(secs, 0)),
        error_message: row.get(13)?,
        duplicate_count: row.get(14)?,
        last_duplicate_attempt: last_duplicate_attempt
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        last_duplicate_user: row.get(16)?,
        cached_at,
    })
}

fn parse_date(identity: &ScanIdentity, raw: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(err) => {
            warn!(
                identity = %identity,
                raw_date = %raw,
                error = %err,
                "invalid invoice date returned by sqlite - dropping it"
            );
            None
        }
    }
}

fn parse_record_state(identity: &ScanIdentity, raw: &str) -> RecordState {
    match raw.parse::<RecordState>() {
        Ok(state) => state,
        Err(err) => {
            warn!(
                identity = %identity,
                raw_state = %raw,
                error = %err,
                "invalid record state returned by sqlite - defaulting to draft"
            );
            RecordState::Draft
        }
    }
}

fn map_sql_error(err: rusqlite::Error) -> VeriScanError {
    VeriScanError::from(InfraError::from(err))
}

fn map_join_error(err: task::JoinError) -> VeriScanError {
    if err.is_cancelled() {
        VeriScanError::Internal("record cache task cancelled".into())
    } else {
        VeriScanError::Internal(format!("record cache task panic: {err}"))
    }
}
