//! SQLite-backed implementation of the pending queue port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio::task;
use tracing::warn;
use veriscan_core::PendingQueue;
use veriscan_domain::{PendingScan, Result as DomainResult, ScanIdentity, SyncState, VeriScanError};

use super::manager::{DbConnection, DbManager};
use crate::errors::InfraError;

/// SQLite-backed pending queue repository.
pub struct SqlitePendingQueue {
    db: Arc<DbManager>,
}

impl SqlitePendingQueue {
    /// Construct a repository backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn insert_row(
        conn: &DbConnection,
        identity: &str,
        payload: &str,
        captured_at: i64,
    ) -> DomainResult<PendingScan> {
        conn.execute(
            PENDING_INSERT_SQL,
            params![
                identity,
                payload,
                captured_at,
                SyncState::Unsynced.to_string(),
                Utc::now().timestamp()
            ],
        )
        .map_err(map_sql_error)?;

        let id = conn.last_insert_rowid();
        conn.query_row(PENDING_SELECT_BY_ID_SQL, params![id], map_pending_row)
            .map_err(map_sql_error)
    }

    fn fetch_unsynced(conn: &DbConnection) -> DomainResult<Vec<PendingScan>> {
        let mut stmt = conn.prepare(PENDING_LIST_UNSYNCED_SQL).map_err(map_sql_error)?;
        let rows = stmt.query_map([], map_pending_row).map_err(map_sql_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
    }
}

#[async_trait]
impl PendingQueue for SqlitePendingQueue {
    async fn append(
        &self,
        identity: &ScanIdentity,
        payload: &str,
        captured_at: DateTime<Utc>,
    ) -> DomainResult<PendingScan> {
        let db = Arc::clone(&self.db);
        let identity = identity.as_str().to_string();
        let payload = payload.to_string();
        let captured_at = captured_at.timestamp();

        task::spawn_blocking(move || -> DomainResult<PendingScan> {
            let conn = db.get_connection()?;
            Self::insert_row(&conn, &identity, &payload, captured_at)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_unsynced(&self) -> DomainResult<Vec<PendingScan>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<PendingScan>> {
            let conn = db.get_connection()?;
            Self::fetch_unsynced(&conn)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_unsynced(&self, identity: &ScanIdentity) -> DomainResult<Option<PendingScan>> {
        let db = Arc::clone(&self.db);
        let identity = identity.as_str().to_string();

        task::spawn_blocking(move || -> DomainResult<Option<PendingScan>> {
            let conn = db.get_connection()?;
            conn.query_row(PENDING_FIND_UNSYNCED_SQL, params![identity], map_pending_row)
                .optional()
                .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_synced(&self, id: i64) -> DomainResult<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(PENDING_MARK_SYNCED_SQL, params![SyncState::Synced.to_string(), id])
                .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_failed(&self, id: i64, reason: &str) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let reason = reason.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                PENDING_MARK_FAILED_SQL,
                params![SyncState::Failed.to_string(), reason, id],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete_synced(&self) -> DomainResult<usize> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<usize> {
            let conn = db.get_connection()?;
            conn.execute(PENDING_DELETE_SYNCED_SQL, params![SyncState::Synced.to_string()])
                .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> DomainResult<usize> {
        let db = Arc::clone(&self.db);
        let cutoff = cutoff.timestamp();

        task::spawn_blocking(move || -> DomainResult<usize> {
            let conn = db.get_connection()?;
            conn.execute(PENDING_PURGE_SQL, params![cutoff]).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

const PENDING_INSERT_SQL: &str = "INSERT INTO pending_scans (
        identity, payload, captured_at, sync_state, created_at
    ) VALUES (?1, ?2, ?3, ?4, ?5)";

const PENDING_SELECT_BY_ID_SQL: &str = "SELECT
        id, identity, payload, captured_at, sync_state, last_error
    FROM pending_scans
    WHERE id = ?1";

const PENDING_LIST_UNSYNCED_SQL: &str = "SELECT
        id, identity, payload, captured_at, sync_state, last_error
    FROM pending_scans
    WHERE sync_state != 'synced'
    ORDER BY captured_at ASC, id ASC";

const PENDING_FIND_UNSYNCED_SQL: &str = "SELECT
        id, identity, payload, captured_at, sync_state, last_error
    FROM pending_scans
    WHERE identity = ?1 AND sync_state != 'synced'
    LIMIT 1";

const PENDING_MARK_SYNCED_SQL: &str =
    "UPDATE pending_scans SET sync_state = ?1, last_error = NULL WHERE id = ?2";

const PENDING_MARK_FAILED_SQL: &str =
    "UPDATE pending_scans SET sync_state = ?1, last_error = ?2 WHERE id = ?3";

const PENDING_DELETE_SYNCED_SQL: &str = "DELETE FROM pending_scans WHERE sync_state = ?1";

const PENDING_PURGE_SQL: &str = "DELETE FROM pending_scans WHERE captured_at < ?1";

fn map_pending_row(row: &Row<'_>) -> rusqlite::Result<PendingScan> {
    let id: i64 = row.get(0)?;
    let identity_raw: String = row.get(1)?;
    let captured_at: i64 = row.get(3)?;
    let state_raw: String = row.get(4)?;

    let captured_at = DateTime::from_timestamp(captured_at, 0).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Integer,
            "timestamp out of range".into(),
        )
    })?;

    Ok(PendingScan {
        id,
        identity: ScanIdentity::extract(&identity_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                "stored identity is not a valid token".into(),
            )
        })?,
        payload: row.get(2)?,
        captured_at,
        sync_state: parse_state(id, &state_raw),
        last_error: row.get(5)?,
    })
}

fn parse_state(id: i64, raw: &str) -> SyncState {
    match raw.parse::<SyncState>() {
        Ok(state) => state,
        Err(err) => {
            warn!(
                row_id = id,
                raw_state = %raw,
                error = %err,
                "invalid sync state returned by sqlite - defaulting to unsynced"
            );
            SyncState::Unsynced
        }
    }
}

fn map_sql_error(err: rusqlite::Error) -> VeriScanError {
    VeriScanError::from(InfraError::from(err))
}

fn map_join_error(err: task::JoinError) -> VeriScanError {
    if err.is_cancelled() {
        VeriScanError::Internal("pending queue task cancelled".into())
    } else {
        VeriScanError::Internal(format!("pending queue task panic: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tempfile::TempDir;

    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn append_reads_back_the_stored_row() {
        let (repo, _manager, _temp_dir) = setup_repository().await;
        let identity = test_identity(1);
        let captured_at = Utc::now();

        let row = repo.append(&identity, "https://example/verif/x", captured_at).await.unwrap();

        assert!(row.id > 0);
        assert_eq!(row.identity, identity);
        assert_eq!(row.payload, "https://example/verif/x");
        assert_eq!(row.captured_at.timestamp(), captured_at.timestamp());
        assert_eq!(row.sync_state, SyncState::Unsynced);
        assert!(row.last_error.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn list_unsynced_orders_by_capture_time() {
        let (repo, _manager, _temp_dir) = setup_repository().await;
        let base = Utc::now();

        repo.append(&test_identity(2), "p2", base - Duration::seconds(20)).await.unwrap();
        repo.append(&test_identity(3), "p3", base - Duration::seconds(10)).await.unwrap();
        repo.append(&test_identity(1), "p1", base - Duration::seconds(30)).await.unwrap();

        let rows = repo.list_unsynced().await.unwrap();
        let payloads: Vec<&str> = rows.iter().map(|r| r.payload.as_str()).collect();
        assert_eq!(payloads, vec!["p1", "p2", "p3"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn find_unsynced_matches_identity() {
        let (repo, _manager, _temp_dir) = setup_repository().await;
        let identity = test_identity(4);
        repo.append(&identity, "p4", Utc::now()).await.unwrap();

        let found = repo.find_unsynced(&identity).await.unwrap();
        assert!(found.is_some());

        let missing = repo.find_unsynced(&test_identity(9)).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mark_synced_hides_the_row_and_delete_prunes_it() {
        let (repo, _manager, _temp_dir) = setup_repository().await;
        let row = repo.append(&test_identity(5), "p5", Utc::now()).await.unwrap();

        repo.mark_synced(row.id).await.unwrap();
        // Marking twice is a no-op.
        repo.mark_synced(row.id).await.unwrap();

        assert!(repo.list_unsynced().await.unwrap().is_empty());
        assert_eq!(repo.delete_synced().await.unwrap(), 1);
        assert_eq!(repo.delete_synced().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejected_rows_stay_listed_with_their_reason() {
        let (repo, _manager, _temp_dir) = setup_repository().await;
        let row = repo.append(&test_identity(6), "p6", Utc::now()).await.unwrap();

        repo.mark_failed(row.id, "Facture inconnue.").await.unwrap();

        let rows = repo.list_unsynced().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sync_state, SyncState::Failed);
        assert_eq!(rows[0].last_error.as_deref(), Some("Facture inconnue."));

        // A rejected capture still counts as queued for duplicate checks.
        assert!(repo.find_unsynced(&test_identity(6)).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn purge_removes_only_expired_rows() {
        let (repo, _manager, _temp_dir) = setup_repository().await;
        let now = Utc::now();

        repo.append(&test_identity(7), "old", now - Duration::hours(25)).await.unwrap();
        repo.append(&test_identity(8), "fresh", now - Duration::hours(1)).await.unwrap();

        let removed = repo.purge_older_than(now - Duration::hours(24)).await.unwrap();
        assert_eq!(removed, 1);

        let rows = repo.list_unsynced().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].payload, "fresh");
    }

    async fn setup_repository() -> (SqlitePendingQueue, Arc<DbManager>, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db_path = temp_dir.path().join("test.db");

        let manager = DbManager::new(&db_path, 4).expect("manager created");
        manager.run_migrations().expect("migrations applied");
        let manager = Arc::new(manager);
        let repo = SqlitePendingQueue::new(Arc::clone(&manager));

        (repo, manager, temp_dir)
    }

    fn test_identity(n: u8) -> ScanIdentity {
        let token = format!("{n:08x}-0000-7000-8000-000000000000");
        ScanIdentity::extract(&token).expect("test identity is canonical")
    }
}
