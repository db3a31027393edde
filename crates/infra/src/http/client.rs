use std::time::Duration;

use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, StatusCode};
use tracing::debug;
use veriscan_common::{Bulkhead, BulkheadConfig, RetryPolicy};
use veriscan_domain::VeriScanError;

use crate::errors::InfraError;

/// HTTP client with built-in retry, backoff, and admission control.
///
/// Retries cover transport failures and gateway statuses (502, 503, 504).
/// Any other status is returned to the caller on the first attempt, so
/// business rejections and expired sessions are never replayed.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: ReqwestClient,
    policy: RetryPolicy,
    bulkhead: Bulkhead,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, VeriScanError> {
        Self::builder().build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the provided request builder with retry semantics.
    ///
    /// A permit from the admission gate is held for the whole logical
    /// operation, retries included.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, VeriScanError> {
        let _permit = self
            .bulkhead
            .acquire()
            .await
            .map_err(|err| VeriScanError::Internal(format!("admission gate failed: {err}")))?;

        let attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            let cloned_builder = builder.try_clone().ok_or_else(|| {
                VeriScanError::Internal(
                    "request body cannot be cloned; buffer the body to enable retries".into(),
                )
            })?;

            let request = cloned_builder.build().map_err(|err| {
                let infra: InfraError = err.into();
                VeriScanError::from(infra)
            })?;

            let method = request.method().clone();
            let url = request.url().clone();
            debug!(attempt, %method, %url, "sending HTTP request");

            match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();
                    debug!(attempt, %method, %url, %status, "received HTTP response");

                    if is_retryable_status(status) && attempt < attempts {
                        self.sleep_with_backoff(attempt).await;
                        continue;
                    }

                    return Ok(response);
                }
                Err(err) => {
                    debug!(attempt, %method, %url, error = %err, "HTTP request failed");

                    if attempt < attempts && should_retry_error(&err) {
                        self.sleep_with_backoff(attempt).await;
                        continue;
                    }

                    let infra: InfraError = err.into();
                    return Err(VeriScanError::from(infra));
                }
            }
        }

        Err(VeriScanError::Internal(
            "http client exhausted retries without producing a result".into(),
        ))
    }

    async fn sleep_with_backoff(&self, attempt: u32) {
        let delay = self.policy.delay_for(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    policy: RetryPolicy,
    max_concurrent_requests: usize,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            policy: RetryPolicy::default(),
            max_concurrent_requests: 5,
            user_agent: None,
            default_headers: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the retry schedule (total attempts, delays, cap).
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Configure how many operations may be in flight at once.
    pub fn max_concurrent_requests(mut self, limit: usize) -> Self {
        self.max_concurrent_requests = limit.max(1);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<HttpClient, VeriScanError> {
        self.policy
            .validate()
            .map_err(|err| VeriScanError::Config(format!("invalid retry policy: {err}")))?;

        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|err| {
            let infra: InfraError = err.into();
            VeriScanError::from(infra)
        })?;

        let gate_config = BulkheadConfig::builder()
            .max_concurrent(self.max_concurrent_requests)
            .build()
            .map_err(|err| VeriScanError::Config(format!("invalid admission gate: {err}")))?;

        Ok(HttpClient { client, policy: self.policy, bulkhead: Bulkhead::new(gate_config) })
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 502 | 503 | 504)
}

fn should_retry_error(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_request() {
        return true;
    }
    if err.is_connect() {
        return true;
    }
    false
}
