//! Typed error taxonomy shared by the HTTP client and the API services.
//!
//! Every error is an immutable value object carrying a machine-readable
//! [`ErrorCode`], a creation timestamp, and enough context (endpoint, HTTP
//! status) for callers to decide on messaging. The core never logs to the
//! user or terminates the process; it only returns these values.

use thiserror::Error;

/// Milliseconds since the Unix epoch, stamped on every error at creation.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Fixed enumeration of machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ApiKeyInvalid,
    ApiRequestFailed,
    ApiResponseInvalid,
    ApiRateLimit,
    RateLimited,
    NetworkError,
    TimeoutError,
    DataNotFound,
    DataInvalid,
    CityNotFound,
    LocationPermissionDenied,
    LocationUnavailable,
}

impl ErrorCode {
    /// Wire name of the code, as emitted by the upstream contract.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiKeyInvalid => "API_KEY_INVALID",
            Self::ApiRequestFailed => "API_REQUEST_FAILED",
            Self::ApiResponseInvalid => "API_RESPONSE_INVALID",
            Self::ApiRateLimit => "API_RATE_LIMIT",
            Self::RateLimited => "RATE_LIMITED",
            Self::NetworkError => "NETWORK_ERROR",
            Self::TimeoutError => "TIMEOUT_ERROR",
            Self::DataNotFound => "DATA_NOT_FOUND",
            Self::DataInvalid => "DATA_INVALID",
            Self::CityNotFound => "CITY_NOT_FOUND",
            Self::LocationPermissionDenied => "LOCATION_PERMISSION_DENIED",
            Self::LocationUnavailable => "LOCATION_UNAVAILABLE",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote service returned a failure signal.
#[derive(Debug, Error)]
#[error("{service}: {message} ({code})")]
pub struct ApiError {
    /// Name of the upstream service that failed.
    pub service: &'static str,
    pub message: String,
    pub code: ErrorCode,
    /// HTTP status, when the failure came from a status classification.
    pub status_code: Option<u16>,
    /// Request endpoint, attached for diagnostics.
    pub endpoint: Option<String>,
    pub timestamp: i64,
}

impl ApiError {
    pub fn new(service: &'static str, message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            service,
            message: message.into(),
            code,
            status_code: None,
            endpoint: None,
            timestamp: now_ms(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

/// Low-level transport failure (DNS, connection reset, TLS).
#[derive(Debug, Error)]
#[error("network error: {message}")]
pub struct NetworkError {
    pub message: String,
    pub timestamp: i64,
    #[source]
    pub source: Option<reqwest::Error>,
}

impl NetworkError {
    pub fn new(message: impl Into<String>, source: Option<reqwest::Error>) -> Self {
        Self {
            message: message.into(),
            timestamp: now_ms(),
            source,
        }
    }
}

/// An attempt exceeded its allotted time.
#[derive(Debug, Error)]
#[error("request timed out after {timeout_ms}ms")]
pub struct TimeoutError {
    pub timeout_ms: u64,
    pub timestamp: i64,
}

impl TimeoutError {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            timestamp: now_ms(),
        }
    }
}

/// A domain-rule violation. Never retried.
#[derive(Debug, Error)]
#[error("validation failed for {field}={value}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub value: String,
    pub message: String,
    pub timestamp: i64,
}

impl ValidationError {
    pub fn new(
        field: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            message: message.into(),
            timestamp: now_ms(),
        }
    }
}

/// Umbrella error for the core and the services built on it.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl Error {
    /// Best-effort machine-readable code for any variant.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Api(e) => e.code,
            Self::Network(_) => ErrorCode::NetworkError,
            Self::Timeout(_) => ErrorCode::TimeoutError,
            Self::Validation(_) => ErrorCode::DataInvalid,
        }
    }

    /// Whether the retry loop may attempt this failure again.
    ///
    /// Transport failures and timeouts are transient; rate-limit
    /// classifications back off and retry. Validation and all other API
    /// failures surface immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Api(e) => e.code == ErrorCode::RateLimited,
            Self::Validation(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_wire_names() {
        assert_eq!(ErrorCode::ApiRequestFailed.as_str(), "API_REQUEST_FAILED");
        assert_eq!(ErrorCode::RateLimited.as_str(), "RATE_LIMITED");
        assert_eq!(ErrorCode::CityNotFound.to_string(), "CITY_NOT_FOUND");
    }

    #[test]
    fn test_api_error_builders() {
        let err = ApiError::new("QWeatherAPI", "boom", ErrorCode::ApiRequestFailed)
            .with_status(502)
            .with_endpoint("/v7/weather/now");
        assert_eq!(err.status_code, Some(502));
        assert_eq!(err.endpoint.as_deref(), Some("/v7/weather/now"));
        assert!(err.timestamp > 0);
        assert!(err.to_string().contains("QWeatherAPI"));
    }

    #[test]
    fn test_is_retryable() {
        let rate = Error::from(ApiError::new("svc", "slow down", ErrorCode::RateLimited));
        assert!(rate.is_retryable());

        let parse = Error::from(ApiError::new("svc", "bad json", ErrorCode::ApiResponseInvalid));
        assert!(!parse.is_retryable());

        let timeout = Error::from(TimeoutError::new(50));
        assert!(timeout.is_retryable());

        let network = Error::from(NetworkError::new("connection refused", None));
        assert!(network.is_retryable());

        let validation = Error::from(ValidationError::new("location", "", "must not be empty"));
        assert!(!validation.is_retryable());
    }

    #[test]
    fn test_umbrella_code() {
        assert_eq!(
            Error::from(TimeoutError::new(10)).code(),
            ErrorCode::TimeoutError
        );
        assert_eq!(
            Error::from(NetworkError::new("dns", None)).code(),
            ErrorCode::NetworkError
        );
    }
}
