//! Mock port implementations shared by the service and engine tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex as TokioMutex;
use veriscan_domain::{
    PendingScan, RecordState, Result, ScanIdentity, ScanRecord, SyncState, VeriScanError,
};

use crate::sync::ports::{
    LedgerGateway, PendingQueue, RecordCache, SubmitVerdict, SyncItem, SyncVerdict,
};

pub(crate) fn make_identity(n: u8) -> ScanIdentity {
    let payload = format!("{n:08x}-0000-7000-8000-000000000000");
    ScanIdentity::extract(&payload).expect("test identity is canonical")
}

pub(crate) fn make_payload(marker: &str, identity: &ScanIdentity) -> String {
    format!("https://{marker}/fr/verification/{identity}")
}

pub(crate) fn make_record(identity: &ScanIdentity, state: RecordState) -> ScanRecord {
    let mut record = ScanRecord::new(identity.clone(), state);
    record.reference = Some(format!("SCAN-{identity}"));
    record
}

pub(crate) struct MockQueue {
    rows: Arc<TokioMutex<Vec<PendingScan>>>,
    next_id: AtomicI64,
    fail_append: bool,
}

impl MockQueue {
    pub(crate) fn new() -> Self {
        Self { rows: Arc::new(TokioMutex::new(Vec::new())), next_id: AtomicI64::new(1), fail_append: false }
    }

    pub(crate) fn with_fail_append(mut self) -> Self {
        self.fail_append = true;
        self
    }

    pub(crate) async fn rows(&self) -> Vec<PendingScan> {
        self.rows.lock().await.clone()
    }

    pub(crate) async fn seed(&self, identity: &ScanIdentity, payload: &str) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().await.push(PendingScan {
            id,
            identity: identity.clone(),
            payload: payload.to_string(),
            captured_at: Utc::now(),
            sync_state: SyncState::Unsynced,
            last_error: None,
        });
        id
    }
}

#[async_trait]
impl PendingQueue for MockQueue {
    async fn append(
        &self,
        identity: &ScanIdentity,
        payload: &str,
        captured_at: DateTime<Utc>,
    ) -> Result<PendingScan> {
        if self.fail_append {
            return Err(VeriScanError::Storage("append failure".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let row = PendingScan {
            id,
            identity: identity.clone(),
            payload: payload.to_string(),
            captured_at,
            sync_state: SyncState::Unsynced,
            last_error: None,
        };
        self.rows.lock().await.push(row.clone());
        Ok(row)
    }

    async fn list_unsynced(&self) -> Result<Vec<PendingScan>> {
        let rows = self.rows.lock().await;
        Ok(rows.iter().filter(|row| row.sync_state != SyncState::Synced).cloned().collect())
    }

    async fn find_unsynced(&self, identity: &ScanIdentity) -> Result<Option<PendingScan>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|row| row.sync_state != SyncState::Synced && &row.identity == identity)
            .cloned())
    }

    async fn mark_synced(&self, id: i64) -> Result<()> {
        let mut rows = self.rows.lock().await;
        if let Some(row) = rows.iter_mut().find(|row| row.id == id) {
            row.sync_state = SyncState::Synced;
        }
        Ok(())
    }

    async fn mark_failed(&self, id: i64, reason: &str) -> Result<()> {
        let mut rows = self.rows.lock().await;
        if let Some(row) = rows.iter_mut().find(|row| row.id == id) {
            row.sync_state = SyncState::Failed;
            row.last_error = Some(reason.to_string());
        }
        Ok(())
    }

    async fn delete_synced(&self) -> Result<usize> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|row| row.sync_state != SyncState::Synced);
        Ok(before - rows.len())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|row| row.captured_at >= cutoff);
        Ok(before - rows.len())
    }
}

#[derive(Default)]
pub(crate) struct MockCache {
    records: Arc<TokioMutex<HashMap<String, ScanRecord>>>,
}

impl MockCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn seed(&self, record: ScanRecord) {
        self.records.lock().await.insert(record.identity.as_str().to_string(), record);
    }

    pub(crate) async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub(crate) async fn get(&self, identity: &ScanIdentity) -> Option<ScanRecord> {
        self.records.lock().await.get(identity.as_str()).cloned()
    }
}

#[async_trait]
impl RecordCache for MockCache {
    async fn find(&self, identity: &ScanIdentity) -> Result<Option<ScanRecord>> {
        Ok(self.records.lock().await.get(identity.as_str()).cloned())
    }

    async fn upsert(&self, record: &ScanRecord) -> Result<()> {
        self.records.lock().await.insert(record.identity.as_str().to_string(), record.clone());
        Ok(())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| record.cached_at >= cutoff);
        Ok(before - records.len())
    }
}

pub(crate) struct MockGateway {
    healthy: AtomicBool,
    submit_responses: TokioMutex<Vec<Result<SubmitVerdict>>>,
    submit_calls: AtomicUsize,
    report_calls: Arc<TokioMutex<Vec<String>>>,
    fail_reports: AtomicBool,
    batch_responses: TokioMutex<Vec<Result<Vec<SyncVerdict>>>>,
    batch_calls: Arc<TokioMutex<Vec<Vec<SyncItem>>>>,
    batch_delay: Option<Duration>,
}

impl MockGateway {
    pub(crate) fn new() -> Self {
        Self {
            healthy: AtomicBool::new(true),
            submit_responses: TokioMutex::new(Vec::new()),
            submit_calls: AtomicUsize::new(0),
            report_calls: Arc::new(TokioMutex::new(Vec::new())),
            fail_reports: AtomicBool::new(false),
            batch_responses: TokioMutex::new(Vec::new()),
            batch_calls: Arc::new(TokioMutex::new(Vec::new())),
            batch_delay: None,
        }
    }

    pub(crate) fn unhealthy(self) -> Self {
        self.healthy.store(false, Ordering::SeqCst);
        self
    }

    pub(crate) fn with_failing_reports(self) -> Self {
        self.fail_reports.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = Some(delay);
        self
    }

    pub(crate) async fn push_submit(&self, response: Result<SubmitVerdict>) {
        self.submit_responses.lock().await.push(response);
    }

    pub(crate) async fn push_batch(&self, response: Result<Vec<SyncVerdict>>) {
        self.batch_responses.lock().await.push(response);
    }

    pub(crate) fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub(crate) async fn report_calls(&self) -> Vec<String> {
        self.report_calls.lock().await.clone()
    }

    pub(crate) async fn batch_calls(&self) -> Vec<Vec<SyncItem>> {
        self.batch_calls.lock().await.clone()
    }
}

#[async_trait]
impl LedgerGateway for MockGateway {
    async fn submit_capture(&self, payload: &str) -> Result<SubmitVerdict> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.submit_responses.lock().await;
        if responses.is_empty() {
            let identity = ScanIdentity::extract(payload)
                .ok_or_else(|| VeriScanError::Validation("payload without token".into()))?;
            return Ok(SubmitVerdict::Created {
                record: make_record(&identity, RecordState::Done),
            });
        }
        responses.remove(0)
    }

    async fn report_duplicate(&self, payload: &str) -> Result<ScanRecord> {
        self.report_calls.lock().await.push(payload.to_string());
        if self.fail_reports.load(Ordering::SeqCst) {
            return Err(VeriScanError::Network("report rejected".into()));
        }
        let identity = ScanIdentity::extract(payload)
            .ok_or_else(|| VeriScanError::Validation("payload without token".into()))?;
        let mut record = make_record(&identity, RecordState::Done);
        record.duplicate_count = 1;
        Ok(record)
    }

    async fn sync_batch(&self, items: &[SyncItem]) -> Result<Vec<SyncVerdict>> {
        if let Some(delay) = self.batch_delay {
            tokio::time::sleep(delay).await;
        }
        self.batch_calls.lock().await.push(items.to_vec());
        let mut responses = self.batch_responses.lock().await;
        if responses.is_empty() {
            return Ok(items.iter().map(|_| SyncVerdict::Accepted { record: None }).collect());
        }
        responses.remove(0)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.healthy.load(Ordering::SeqCst))
    }
}
