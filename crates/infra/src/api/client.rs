//! Ledger service client
//!
//! JSON-over-HTTP client for the invoice ledger endpoints. Requests go
//! through [`HttpClient`] for retry and admission control; every response
//! is the standard envelope, decoded here into domain outcomes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;
use veriscan_common::resilience::RetryPolicy;
use veriscan_core::{LedgerGateway, SubmitVerdict, SyncItem, SyncVerdict};
use veriscan_domain::{
    ApiConfig, RecordState, Result, ScanIdentity, ScanRecord, VeriScanError,
};

use super::dto::{
    ApiEnvelope, ApiErrorBody, CaptureRequest, CheckData, HealthData, HistoryData,
    PaginationDto, RecordActionData, ReportDuplicateData, ScanSubmitData, StatsData,
    SyncData, SyncRequest, SyncResultDto, SyncScanDto,
};
use super::session::SessionHandle;
use crate::http::HttpClient;

/// Envelope error codes that invalidate the stored session token
const AUTH_ERROR_CODES: [&str; 4] =
    ["AUTH_REQUIRED", "AUTH_INVALID", "AUTH_FAILED", "USER_INACTIVE"];

/// One page of server-side scan history
#[derive(Debug)]
pub struct ScanHistory {
    pub records: Vec<ScanRecord>,
    pub pagination: PaginationDto,
}

/// Client for the invoice ledger service
///
/// Implements [`LedgerGateway`] for the reconciliation core and exposes
/// the read-side endpoints (check, history, stats) for host UIs.
#[derive(Debug)]
pub struct LedgerClient {
    http: HttpClient,
    base_url: String,
    session: Arc<SessionHandle>,
    bulk_timeout: Duration,
    health_timeout: Duration,
}

impl LedgerClient {
    /// Create a client from the API configuration
    ///
    /// # Errors
    ///
    /// Returns `Config` if the base URL or retry settings are invalid.
    pub fn new(config: &ApiConfig, session: Arc<SessionHandle>) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|err| {
            VeriScanError::Config(format!("invalid API base URL '{}': {err}", config.base_url))
        })?;

        let policy = RetryPolicy::builder()
            .max_attempts(config.max_attempts)
            .initial_delay(Duration::from_millis(config.initial_retry_delay_ms))
            .multiplier(config.retry_backoff_multiplier)
            .max_delay(Duration::from_millis(config.max_retry_delay_ms))
            .build()
            .map_err(|err| VeriScanError::Config(format!("invalid retry policy: {err}")))?;

        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .retry_policy(policy)
            .max_concurrent_requests(config.max_concurrent_requests)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            session,
            bulk_timeout: Duration::from_secs(config.bulk_sync_timeout_seconds),
            health_timeout: Duration::from_secs(config.health_timeout_seconds),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Authenticated request builder for `path`
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self
            .http
            .request(method, self.endpoint(path))
            .header("Content-Type", "application/json");
        if let Some(token) = self.session.bearer_token() {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        request
    }

    /// Decode a response into the standard envelope.
    ///
    /// A non-success status whose body is not an envelope maps to `Server`
    /// with a synthetic `HTTP_<status>` code; a bare 401 additionally
    /// flags the session as expired.
    async fn decode_envelope<T: DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<ApiEnvelope<T>> {
        let status = response.status();
        let body = response.text().await.map_err(|err| {
            VeriScanError::Network(format!("failed to read response body: {err}"))
        })?;

        if let Ok(envelope) = serde_json::from_str::<ApiEnvelope<T>>(&body) {
            return Ok(envelope);
        }

        if status == StatusCode::UNAUTHORIZED {
            self.session.notify_expired();
            return Err(VeriScanError::Auth(format!("HTTP 401 without an envelope: {body}")));
        }
        if status.is_success() {
            return Err(VeriScanError::Parse(format!("malformed envelope: {body}")));
        }
        Err(VeriScanError::Server {
            code: format!("HTTP_{}", status.as_u16()),
            message: if body.is_empty() { status.to_string() } else { body },
        })
    }

    /// Map an envelope error body into the error taxonomy.
    ///
    /// Auth rejections clear the session token so subscribers can prompt
    /// for re-authentication; every other code keeps the server's message
    /// verbatim for display.
    fn envelope_error(&self, error: ApiErrorBody) -> VeriScanError {
        if AUTH_ERROR_CODES.contains(&error.code.as_str()) {
            self.session.notify_expired();
            return VeriScanError::Auth(error.message);
        }
        VeriScanError::Server { code: error.code, message: error.message }
    }

    fn require_data<T>(data: Option<T>, path: &str) -> Result<T> {
        data.ok_or_else(|| VeriScanError::Parse(format!("{path} response carried no data")))
    }

    /* -------------------------------------------------------------- */
    /* Read-side endpoints                                            */
    /* -------------------------------------------------------------- */

    /// Ask the service whether a capture already exists, without creating
    /// anything. Returns the existing record when it does.
    #[instrument(skip(self, payload))]
    pub async fn check_capture(&self, payload: &str) -> Result<Option<ScanRecord>> {
        let request = self.request(Method::POST, "check").json(&CaptureRequest { qr_url: payload });
        let response = self.http.send(request).await?;
        let envelope: ApiEnvelope<CheckData> = self.decode_envelope(response).await?;

        if let Some(error) = envelope.error {
            return Err(self.envelope_error(error));
        }
        let data = Self::require_data(envelope.data, "check")?;
        if !data.exists {
            return Ok(None);
        }

        let dto = Self::require_data(data.scan_record, "check")?;
        let identity = dto
            .identity()
            .or_else(|| ScanIdentity::extract(payload))
            .ok_or_else(|| VeriScanError::Parse("check response carried no identity".into()))?;
        Ok(Some(dto.into_record(identity)))
    }

    /// Fetch one page of scan history. `limit` is capped server-side at 100.
    #[instrument(skip(self))]
    pub async fn fetch_history(
        &self,
        page: u32,
        limit: u32,
        state: Option<RecordState>,
    ) -> Result<ScanHistory> {
        let mut query = vec![("page", page.to_string()), ("limit", limit.to_string())];
        if let Some(state) = state {
            query.push(("state", state.to_string()));
        }

        let request = self.request(Method::GET, "history").query(&query);
        let response = self.http.send(request).await?;
        let envelope: ApiEnvelope<HistoryData> = self.decode_envelope(response).await?;

        if let Some(error) = envelope.error {
            return Err(self.envelope_error(error));
        }
        let data = Self::require_data(envelope.data, "history")?;

        let mut records = Vec::with_capacity(data.records.len());
        for dto in data.records {
            match dto.identity() {
                Some(identity) => records.push(dto.into_record(identity)),
                None => warn!(id = ?dto.id, "History entry without an identity, skipping"),
            }
        }

        Ok(ScanHistory { records, pagination: data.pagination.unwrap_or_default() })
    }

    /// Fetch the aggregate scan statistics.
    #[instrument(skip(self))]
    pub async fn fetch_stats(&self) -> Result<StatsData> {
        let response = self.http.send(self.request(Method::GET, "stats")).await?;
        let envelope: ApiEnvelope<StatsData> = self.decode_envelope(response).await?;

        if let Some(error) = envelope.error {
            return Err(self.envelope_error(error));
        }
        Self::require_data(envelope.data, "stats")
    }

    /// Mark a scan as processed. Only scans whose invoice exists can be
    /// marked; the service answers `INVALID_STATE` otherwise.
    #[instrument(skip(self))]
    pub async fn mark_processed(&self, record_id: i64) -> Result<ScanRecord> {
        self.record_action(&format!("mark-processed/{record_id}")).await
    }

    /// Put a processed scan back into the created state.
    #[instrument(skip(self))]
    pub async fn mark_unprocessed(&self, record_id: i64) -> Result<ScanRecord> {
        self.record_action(&format!("mark-unprocessed/{record_id}")).await
    }

    async fn record_action(&self, path: &str) -> Result<ScanRecord> {
        let response = self.http.send(self.request(Method::POST, path)).await?;
        let envelope: ApiEnvelope<RecordActionData> = self.decode_envelope(response).await?;

        if let Some(error) = envelope.error {
            return Err(self.envelope_error(error));
        }
        let dto = Self::require_data(envelope.data, path)
            .and_then(|data| Self::require_data(data.record, path))?;
        let identity = dto
            .identity()
            .ok_or_else(|| VeriScanError::Parse(format!("{path} response carried no identity")))?;
        Ok(dto.into_record(identity))
    }
}

/* ------------------------------------------------------------------ */
/* Gateway implementation                                             */
/* ------------------------------------------------------------------ */

#[async_trait]
impl LedgerGateway for LedgerClient {
    async fn submit_capture(&self, payload: &str) -> Result<SubmitVerdict> {
        let identity = ScanIdentity::extract(payload).ok_or_else(|| {
            VeriScanError::Validation("payload carries no invoice token".into())
        })?;
        debug!(identity = %identity, "Submitting capture to the ledger");

        let request = self.request(Method::POST, "scan").json(&CaptureRequest { qr_url: payload });
        let response = self.http.send(request).await?;
        let envelope: ApiEnvelope<ScanSubmitData> = self.decode_envelope(response).await?;

        match envelope.error {
            None => {
                let data = Self::require_data(envelope.data, "scan")?;
                Ok(SubmitVerdict::Created { record: data.into_created_record(identity) })
            }
            Some(error) if error.code == "DUPLICATE" => {
                let duplicate_count =
                    envelope.data.as_ref().and_then(|data| data.duplicate_count).unwrap_or(0);
                let record = envelope.data.and_then(|data| data.existing_record).map(|dto| {
                    let key = dto.identity().unwrap_or_else(|| identity.clone());
                    dto.into_record(key)
                });
                debug!(identity = %identity, duplicate_count, "Ledger reports an existing capture");
                Ok(SubmitVerdict::Duplicate { record, duplicate_count })
            }
            Some(error) => Err(self.envelope_error(error)),
        }
    }

    async fn report_duplicate(&self, payload: &str) -> Result<ScanRecord> {
        let identity = ScanIdentity::extract(payload).ok_or_else(|| {
            VeriScanError::Validation("payload carries no invoice token".into())
        })?;
        debug!(identity = %identity, "Reporting a locally detected duplicate");

        let request = self
            .request(Method::POST, "report-duplicate")
            .json(&CaptureRequest { qr_url: payload });
        let response = self.http.send(request).await?;
        let envelope: ApiEnvelope<ReportDuplicateData> = self.decode_envelope(response).await?;

        if let Some(error) = envelope.error {
            return Err(self.envelope_error(error));
        }
        let dto = Self::require_data(envelope.data, "report-duplicate")
            .and_then(|data| Self::require_data(data.record, "report-duplicate"))?;
        let key = dto.identity().unwrap_or(identity);
        Ok(dto.into_record(key))
    }

    async fn sync_batch(&self, items: &[SyncItem]) -> Result<Vec<SyncVerdict>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let scans = items
            .iter()
            .map(|item| SyncScanDto {
                qr_url: item.payload.clone(),
                scanned_at: item.captured_at.to_rfc3339(),
            })
            .collect();
        debug!(count = items.len(), "Submitting offline batch to the ledger");

        let request = self
            .request(Method::POST, "sync")
            .json(&SyncRequest { scans })
            .timeout(self.bulk_timeout);
        let response = self.http.send(request).await?;
        let envelope: ApiEnvelope<SyncData> = self.decode_envelope(response).await?;

        if let Some(error) = envelope.error {
            return Err(self.envelope_error(error));
        }
        let data = Self::require_data(envelope.data, "sync")?;

        // The service answers in request order; fall back to the submitted
        // payload when a result omits its identity.
        let verdicts = data
            .results
            .into_iter()
            .enumerate()
            .map(|(index, result)| {
                let fallback =
                    items.get(index).and_then(|item| ScanIdentity::extract(&item.payload));
                sync_verdict(result, fallback)
            })
            .collect();
        Ok(verdicts)
    }

    async fn health_check(&self) -> Result<bool> {
        // No auth header; the endpoint is open and the probe must answer
        // quickly even when the stored token is stale.
        let request = self.http.request(Method::GET, self.endpoint("health"));

        let outcome = tokio::time::timeout(self.health_timeout, self.http.send(request)).await;
        let response = match outcome {
            Err(_) => {
                warn!("Health check timed out");
                return Ok(false);
            }
            Ok(Err(err)) => {
                debug!(error = %err, "Ledger service unreachable");
                return Ok(false);
            }
            Ok(Ok(response)) => response,
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "Health check returned non-success status");
            return Ok(false);
        }

        match self.decode_envelope::<HealthData>(response).await {
            Ok(envelope) => Ok(envelope.data.is_some_and(|data| data.is_healthy())),
            Err(err) => {
                warn!(error = %err, "Health response malformed");
                Ok(false)
            }
        }
    }
}

fn sync_verdict(result: SyncResultDto, fallback: Option<ScanIdentity>) -> SyncVerdict {
    let identity = result.qr_url.as_deref().and_then(ScanIdentity::extract).or(fallback);

    if result.success {
        let record = identity.map(|key| result.into_submit_data().into_created_record(key));
        return SyncVerdict::Accepted { record };
    }

    if result.error_code.as_deref() == Some("DUPLICATE") {
        let record = result.existing_record.and_then(|dto| {
            let key = dto.identity().or(identity)?;
            Some(dto.into_record(key))
        });
        return SyncVerdict::Duplicate { record };
    }

    SyncVerdict::Rejected {
        code: result.error_code,
        reason: result.error.unwrap_or_else(|| "Erreur lors du scan".to_string()),
    }
}
