//! API configuration: hosts, endpoints, and request tuning.
//!
//! All values come from the environment with safe defaults; the clamps keep
//! a misconfigured environment from producing an unusable client (timeout
//! below one second, zero retries).

use std::time::Duration;

use url::Url;

use crate::cache::DEFAULT_CACHE_TTL;
use crate::error::{ApiError, Error, ErrorCode, ValidationError};
use crate::http::{DEFAULT_RETRIES, DEFAULT_TIMEOUT};

/// Weather data endpoints, relative to the versioned base.
pub mod endpoints {
    pub const CURRENT_WEATHER: &str = "/weather/now";
    pub const FORECAST_7D: &str = "/weather/7d";
    pub const FORECAST_24H: &str = "/weather/24h";
    pub const AIR_QUALITY: &str = "/air/now";
    pub const WARNING: &str = "/warning/now";

    pub const CITY_LOOKUP: &str = "/city/lookup";
    pub const CITY_TOP: &str = "/city/top";
}

const DEFAULT_WEATHER_HOST: &str = "https://devapi.qweather.com";
const DEFAULT_GEO_HOST: &str = "https://geoapi.qweather.com";

/// Reduce a URL to `scheme://host`, or trim a trailing slash when it does
/// not parse as an absolute URL.
pub fn normalize_base_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => match url.host_str() {
            Some(host) => match url.port() {
                Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
                None => format!("{}://{}", url.scheme(), host),
            },
            None => raw.trim_end_matches('/').to_string(),
        },
        Err(_) => raw.trim_end_matches('/').to_string(),
    }
}

/// Dedicated QWeather hosts serve the geo API under a `geo/` prefix.
fn is_dedicated_host(base_url: &str) -> bool {
    Url::parse(base_url)
        .ok()
        .and_then(|url| url.host_str().map(|h| h.ends_with("qweatherapi.com")))
        .unwrap_or(false)
}

/// Weather API host and version segment.
#[derive(Debug, Clone)]
pub struct WeatherApiConfig {
    pub base_url: String,
    pub version: String,
}

impl Default for WeatherApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WEATHER_HOST)
    }
}

impl WeatherApiConfig {
    pub fn new(host: &str) -> Self {
        Self {
            base_url: normalize_base_url(host),
            version: "v7".to_string(),
        }
    }

    pub fn from_env() -> Self {
        match std::env::var("QWEATHER_API_HOST") {
            Ok(host) if !host.is_empty() => Self::new(&host),
            _ => Self::default(),
        }
    }

    /// Versioned path for an endpoint, e.g. `/v7/weather/now`.
    pub fn endpoint(&self, endpoint: &str) -> String {
        format!("/{}{}", self.version, endpoint)
    }
}

/// Geo API host and version segment.
#[derive(Debug, Clone)]
pub struct GeoApiConfig {
    pub base_url: String,
    pub version: String,
}

impl Default for GeoApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_GEO_HOST)
    }
}

impl GeoApiConfig {
    pub fn new(host: &str) -> Self {
        let version = if is_dedicated_host(host) { "geo/v2" } else { "v2" };
        Self {
            base_url: normalize_base_url(host),
            version: version.to_string(),
        }
    }

    pub fn from_env() -> Self {
        match std::env::var("QWEATHER_GEO_API_HOST") {
            Ok(host) if !host.is_empty() => Self::new(&host),
            _ => Self::default(),
        }
    }

    pub fn endpoint(&self, endpoint: &str) -> String {
        format!("/{}{}", self.version, endpoint)
    }
}

/// Request tuning shared by all services: credentials, timeout, retry
/// count, and default cache lifetime.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub api_key: String,
    pub timeout: Duration,
    pub retries: u32,
    pub cache_ttl: Duration,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl RequestConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        let api_key = std::env::var("QWEATHER_API_KEY").unwrap_or_default();
        let timeout_ms = env_u64("API_TIMEOUT_MS")
            .unwrap_or(DEFAULT_TIMEOUT.as_millis() as u64)
            .max(1000);
        let retries = env_u64("API_RETRY_TIMES")
            .unwrap_or(u64::from(DEFAULT_RETRIES))
            .max(1) as u32;
        let cache_ttl_ms =
            env_u64("API_CACHE_DURATION_MS").unwrap_or(DEFAULT_CACHE_TTL.as_millis() as u64);

        Self {
            api_key,
            timeout: Duration::from_millis(timeout_ms),
            retries,
            cache_ttl: Duration::from_millis(cache_ttl_ms),
        }
    }

    /// Check the key shape and host scheme before any request goes out.
    pub fn validate(&self, weather: &WeatherApiConfig, geo: &GeoApiConfig) -> Result<(), Error> {
        if self.api_key.len() != 32 {
            return Err(ApiError::new(
                "QWeatherAPI",
                "missing or malformed API key",
                ErrorCode::ApiKeyInvalid,
            )
            .into());
        }
        for (field, base_url) in [("weather_host", &weather.base_url), ("geo_host", &geo.base_url)]
        {
            if !base_url.starts_with("https://") {
                return Err(
                    ValidationError::new(field, base_url, "API host must use HTTPS").into(),
                );
            }
        }
        Ok(())
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_path_and_query() {
        assert_eq!(
            normalize_base_url("https://devapi.qweather.com/v7/weather?x=1"),
            "https://devapi.qweather.com"
        );
        assert_eq!(
            normalize_base_url("https://example.com:8443/api/"),
            "https://example.com:8443"
        );
        assert_eq!(normalize_base_url("nonsense/"), "nonsense");
    }

    #[test]
    fn test_geo_version_depends_on_host() {
        assert_eq!(GeoApiConfig::new("https://geoapi.qweather.com").version, "v2");
        assert_eq!(
            GeoApiConfig::new("https://abc123.re.qweatherapi.com").version,
            "geo/v2"
        );
    }

    #[test]
    fn test_endpoint_paths() {
        let weather = WeatherApiConfig::default();
        assert_eq!(weather.endpoint(endpoints::CURRENT_WEATHER), "/v7/weather/now");

        let geo = GeoApiConfig::default();
        assert_eq!(geo.endpoint(endpoints::CITY_LOOKUP), "/v2/city/lookup");
    }

    #[test]
    fn test_validate_rejects_bad_key() {
        let config = RequestConfig::new("short");
        let err = config
            .validate(&WeatherApiConfig::default(), &GeoApiConfig::default())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ApiKeyInvalid);
    }

    #[test]
    fn test_validate_rejects_http_host() {
        let config = RequestConfig::new("0123456789abcdef0123456789abcdef");
        let weather = WeatherApiConfig::new("http://devapi.qweather.com");
        let err = config.validate(&weather, &GeoApiConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        let config = RequestConfig::new("0123456789abcdef0123456789abcdef");
        assert!(config
            .validate(&WeatherApiConfig::default(), &GeoApiConfig::default())
            .is_ok());
    }
}
