//! Core building blocks for the Skycast weather services.
//!
//! Provides a resilient HTTP client (timeout, retry with exponential
//! backoff and jitter, typed failure classification), an in-memory TTL
//! cache, the shared error taxonomy, and the API configuration layer.
//!
//! Instances are plain values constructed by the caller; there is no
//! process-wide state.

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::CacheManager;
pub use error::{ApiError, Error, ErrorCode, NetworkError, TimeoutError, ValidationError};
pub use http::{BackoffPolicy, HttpClient, RequestOptions};
