//! Resilient HTTP client: per-attempt timeouts, exponential backoff with
//! jitter, and uniform failure classification.
//!
//! The retry loop is deliberately uniform: every failed attempt (transport
//! error, timeout, 429/5xx, other non-2xx) re-enters the same loop, and the
//! distinction only decides which error is surfaced once attempts are
//! exhausted. The two exceptions are JSON decode failures, which are final,
//! and validation failures, which never reach the loop.

use std::time::Duration;

use rand::Rng;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ApiError, Error, ErrorCode, NetworkError, TimeoutError, ValidationError};

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);
/// Default number of attempts per logical call.
pub const DEFAULT_RETRIES: u32 = 3;

/// Exponential backoff with a small uniform jitter and a hard ceiling.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base: Duration,
    jitter: Duration,
    cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(1000),
            Duration::from_millis(250),
            Duration::from_millis(60_000),
        )
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, jitter: Duration, cap: Duration) -> Self {
        Self { base, jitter, cap }
    }

    /// Delay before the retry following failed attempt `attempt` (zero-indexed):
    /// `min(base * 2^attempt + uniform[0, jitter), cap)`.
    ///
    /// Deterministic base growth plus small randomization; not full jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = (self.base.as_millis() as u64).saturating_mul(2u64.saturating_pow(attempt));
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..jitter_ms)
        };
        let capped = exp.saturating_add(jitter).min(self.cap.as_millis() as u64);
        Duration::from_millis(capped)
    }
}

/// Per-call overrides for timeout, retry count, and extra headers.
///
/// Caller-supplied headers are applied last and override the defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub headers: Option<reqwest::header::HeaderMap>,
}

/// HTTP client bound to a single base URL.
///
/// Configuration is immutable after construction and the client holds no
/// per-call state, so one instance can be shared freely. There is no
/// single-flight coalescing: concurrent calls for the same resource each
/// execute their own request.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
    service: &'static str,
    default_timeout: Duration,
    default_retries: u32,
    backoff: BackoffPolicy,
}

impl HttpClient {
    /// Create a client for `base_url` with default timeout and retry count.
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let base_url = Url::parse(base_url).map_err(|err| {
            ValidationError::new("base_url", base_url, format!("invalid base URL: {err}"))
        })?;
        let client = Client::builder()
            .build()
            .map_err(|err| NetworkError::new("failed to build HTTP client", Some(err)))?;

        Ok(Self {
            client,
            base_url,
            service: "api",
            default_timeout: DEFAULT_TIMEOUT,
            default_retries: DEFAULT_RETRIES,
            backoff: BackoffPolicy::default(),
        })
    }

    /// Name the upstream service for error reporting.
    pub fn with_service(mut self, service: &'static str) -> Self {
        self.service = service;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.default_retries = retries;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// GET `endpoint` with query parameters, decoding the JSON response.
    ///
    /// `None`-valued parameters are omitted from the query string.
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, Option<String>)],
        options: &RequestOptions,
    ) -> Result<T, Error> {
        let url = self.build_url(endpoint, params)?;
        self.execute(Method::GET, url, endpoint, None, options).await
    }

    /// POST a JSON body to `endpoint`, decoding the JSON response.
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
        options: &RequestOptions,
    ) -> Result<T, Error> {
        let url = self.build_url(endpoint, &[])?;
        let body = serde_json::to_vec(body).map_err(|err| {
            ValidationError::new("body", "<json>", format!("unserializable request body: {err}"))
        })?;
        self.execute(Method::POST, url, endpoint, Some(body), options)
            .await
    }

    fn build_url(&self, endpoint: &str, params: &[(&str, Option<String>)]) -> Result<Url, Error> {
        let mut url = self.base_url.join(endpoint).map_err(|err| {
            Error::from(ValidationError::new(
                "endpoint",
                endpoint,
                format!("invalid endpoint: {err}"),
            ))
        })?;
        if params.iter().any(|(_, value)| value.is_some()) {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                if let Some(value) = value {
                    pairs.append_pair(key, value);
                }
            }
        }
        Ok(url)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        endpoint: &str,
        body: Option<Vec<u8>>,
        options: &RequestOptions,
    ) -> Result<T, Error> {
        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let attempts = options.retries.unwrap_or(self.default_retries).max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.backoff.delay_for_attempt(attempt - 1);
                tracing::debug!(
                    endpoint,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }

            match self
                .attempt(&method, url.clone(), endpoint, body.as_deref(), options, timeout)
                .await
            {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::debug!(endpoint, attempt, "request succeeded after retry");
                    }
                    return Ok(value);
                }
                // A body that decoded as garbage will not improve on retry.
                Err(err) if err.code() == ErrorCode::ApiResponseInvalid => return Err(err),
                Err(err) => {
                    tracing::warn!(endpoint, attempt, error = %err, "request attempt failed");
                    last_error = Some(err);
                }
            }
        }

        if let Some(err) = last_error {
            tracing::debug!(endpoint, error = %err, "retries exhausted; last attempt error");
        }
        Err(ApiError::new(
            self.service,
            format!("request to {endpoint} failed after {attempts} attempts"),
            ErrorCode::ApiRequestFailed,
        )
        .with_endpoint(endpoint)
        .into())
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        method: &Method,
        url: Url,
        endpoint: &str,
        body: Option<&[u8]>,
        options: &RequestOptions,
        timeout: Duration,
    ) -> Result<T, Error> {
        let mut request = self
            .client
            .request(method.clone(), url)
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_vec());
        }
        if let Some(headers) = &options.headers {
            request = request.headers(headers.clone());
        }

        // One timeout covers the whole attempt, send through body read.
        // Dropping the elapsed future cancels only this attempt, never the
        // surrounding retry loop.
        let outcome = tokio::time::timeout(timeout, async {
            let response = request.send().await?;
            let status = response.status();
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, bytes))
        })
        .await;

        let (status, bytes) = match outcome {
            Ok(Ok(pair)) => pair,
            Ok(Err(err)) => {
                return Err(
                    NetworkError::new(format!("request to {endpoint} failed"), Some(err)).into(),
                )
            }
            Err(_) => return Err(TimeoutError::new(timeout.as_millis() as u64).into()),
        };

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(ApiError::new(
                self.service,
                format!("service busy or rate limited ({status})"),
                ErrorCode::RateLimited,
            )
            .with_status(status.as_u16())
            .with_endpoint(endpoint)
            .into());
        }
        if !status.is_success() {
            return Err(ApiError::new(
                self.service,
                format!("HTTP error: {status}"),
                ErrorCode::ApiRequestFailed,
            )
            .with_status(status.as_u16())
            .with_endpoint(endpoint)
            .into());
        }

        serde_json::from_slice(&bytes).map_err(|err| {
            ApiError::new(
                self.service,
                format!("failed to decode response body: {err}"),
                ErrorCode::ApiResponseInvalid,
            )
            .with_endpoint(endpoint)
            .into()
        })
    }
}
