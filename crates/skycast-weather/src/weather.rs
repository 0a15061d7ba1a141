//! Weather lookups against the QWeather data API, with per-endpoint caching.

use std::time::Duration;

use tracing::instrument;

use skycast_core::config::{endpoints, RequestConfig, WeatherApiConfig};
use skycast_core::error::{ApiError, Error, ErrorCode};
use skycast_core::{CacheManager, HttpClient, RequestOptions};

use crate::types::{
    AirQuality, AirResponse, CurrentWeather, DailyForecast, DailyResponse, HourlyResponse,
    HourlyWeather, NowResponse, WarningResponse, WeatherWarning,
};

const SERVICE: &str = "QWeatherAPI";

// Cache lifetimes follow how quickly each payload goes stale upstream.
const CURRENT_TTL: Duration = Duration::from_secs(30 * 60);
const DAILY_TTL: Duration = Duration::from_secs(2 * 60 * 60);
const HOURLY_TTL: Duration = Duration::from_secs(60 * 60);
const AIR_TTL: Duration = Duration::from_secs(30 * 60);
const WARNING_TTL: Duration = Duration::from_secs(10 * 60);

/// Map the QWeather envelope code to an error, or pass "200" through.
pub(crate) fn ensure_ok(code: &str, endpoint: &str, empty_message: &str) -> Result<(), Error> {
    if code == "204" {
        return Err(ApiError::new(SERVICE, empty_message, ErrorCode::DataNotFound)
            .with_endpoint(endpoint)
            .into());
    }
    if code != "200" {
        return Err(
            ApiError::new(SERVICE, format!("API error: {code}"), ErrorCode::ApiRequestFailed)
                .with_endpoint(endpoint)
                .into(),
        );
    }
    Ok(())
}

pub(crate) fn missing_payload(endpoint: &str) -> Error {
    ApiError::new(SERVICE, "response payload missing", ErrorCode::DataNotFound)
        .with_endpoint(endpoint)
        .into()
}

/// Weather data service. Owns its HTTP client and cache; construct one per
/// upstream configuration and share it by reference.
pub struct WeatherService {
    http: HttpClient,
    cache: CacheManager,
    api: WeatherApiConfig,
    api_key: String,
}

impl WeatherService {
    pub fn new(api: WeatherApiConfig, request: &RequestConfig) -> Result<Self, Error> {
        let http = HttpClient::new(&api.base_url)?
            .with_service(SERVICE)
            .with_timeout(request.timeout)
            .with_retries(request.retries);
        Ok(Self {
            http,
            cache: CacheManager::new(request.cache_ttl),
            api,
            api_key: request.api_key.clone(),
        })
    }

    fn params(&self, location_id: &str) -> [(&'static str, Option<String>); 2] {
        [
            ("location", Some(location_id.to_string())),
            ("key", Some(self.api_key.clone())),
        ]
    }

    /// Current observed conditions for a LocationID.
    #[instrument(skip(self), level = "info")]
    pub async fn current_weather(
        &self,
        location_id: &str,
        force_refresh: bool,
    ) -> Result<CurrentWeather, Error> {
        let cache_key = format!("current_weather_{location_id}");
        if !force_refresh {
            if let Some(cached) = self.cache.get::<CurrentWeather>(&cache_key) {
                tracing::debug!(location_id, "current weather served from cache");
                return Ok(cached);
            }
        }

        let endpoint = self.api.endpoint(endpoints::CURRENT_WEATHER);
        let response: NowResponse = self
            .http
            .get(&endpoint, &self.params(location_id), &RequestOptions::default())
            .await?;

        ensure_ok(&response.code, &endpoint, "no current weather data")?;
        let now = response.now.ok_or_else(|| missing_payload(&endpoint))?;
        self.cache.set(&cache_key, now.clone(), Some(CURRENT_TTL));
        Ok(now)
    }

    /// Seven-day forecast for a LocationID.
    #[instrument(skip(self), level = "info")]
    pub async fn daily_forecast(
        &self,
        location_id: &str,
        force_refresh: bool,
    ) -> Result<Vec<DailyForecast>, Error> {
        let cache_key = format!("forecast_7d_{location_id}");
        if !force_refresh {
            if let Some(cached) = self.cache.get::<Vec<DailyForecast>>(&cache_key) {
                tracing::debug!(location_id, "daily forecast served from cache");
                return Ok(cached);
            }
        }

        let endpoint = self.api.endpoint(endpoints::FORECAST_7D);
        let response: DailyResponse = self
            .http
            .get(&endpoint, &self.params(location_id), &RequestOptions::default())
            .await?;

        ensure_ok(&response.code, &endpoint, "no forecast data")?;
        let daily = response.daily.ok_or_else(|| missing_payload(&endpoint))?;
        self.cache.set(&cache_key, daily.clone(), Some(DAILY_TTL));
        Ok(daily)
    }

    /// Twenty-four-hour forecast for a LocationID.
    #[instrument(skip(self), level = "info")]
    pub async fn hourly_forecast(
        &self,
        location_id: &str,
        force_refresh: bool,
    ) -> Result<Vec<HourlyWeather>, Error> {
        let cache_key = format!("forecast_24h_{location_id}");
        if !force_refresh {
            if let Some(cached) = self.cache.get::<Vec<HourlyWeather>>(&cache_key) {
                tracing::debug!(location_id, "hourly forecast served from cache");
                return Ok(cached);
            }
        }

        let endpoint = self.api.endpoint(endpoints::FORECAST_24H);
        let response: HourlyResponse = self
            .http
            .get(&endpoint, &self.params(location_id), &RequestOptions::default())
            .await?;

        ensure_ok(&response.code, &endpoint, "no hourly data")?;
        let hourly = response.hourly.ok_or_else(|| missing_payload(&endpoint))?;
        self.cache.set(&cache_key, hourly.clone(), Some(HOURLY_TTL));
        Ok(hourly)
    }

    /// Real-time air quality for a LocationID.
    #[instrument(skip(self), level = "info")]
    pub async fn air_quality(
        &self,
        location_id: &str,
        force_refresh: bool,
    ) -> Result<AirQuality, Error> {
        let cache_key = format!("air_now_{location_id}");
        if !force_refresh {
            if let Some(cached) = self.cache.get::<AirQuality>(&cache_key) {
                tracing::debug!(location_id, "air quality served from cache");
                return Ok(cached);
            }
        }

        let endpoint = self.api.endpoint(endpoints::AIR_QUALITY);
        let response: AirResponse = self
            .http
            .get(&endpoint, &self.params(location_id), &RequestOptions::default())
            .await?;

        ensure_ok(&response.code, &endpoint, "no air quality data")?;
        let air = response.now.ok_or_else(|| missing_payload(&endpoint))?;
        self.cache.set(&cache_key, air.clone(), Some(AIR_TTL));
        Ok(air)
    }

    /// Active severe weather warnings for a LocationID.
    ///
    /// An empty list is a normal answer; only the envelope distinguishes
    /// "no warnings active" from "no data for this location".
    #[instrument(skip(self), level = "info")]
    pub async fn warnings(
        &self,
        location_id: &str,
        force_refresh: bool,
    ) -> Result<Vec<WeatherWarning>, Error> {
        let cache_key = format!("warning_now_{location_id}");
        if !force_refresh {
            if let Some(cached) = self.cache.get::<Vec<WeatherWarning>>(&cache_key) {
                tracing::debug!(location_id, "warnings served from cache");
                return Ok(cached);
            }
        }

        let endpoint = self.api.endpoint(endpoints::WARNING);
        let response: WarningResponse = self
            .http
            .get(&endpoint, &self.params(location_id), &RequestOptions::default())
            .await?;

        ensure_ok(&response.code, &endpoint, "no warning data")?;
        let warnings = response.warning.unwrap_or_default();
        self.cache.set(&cache_key, warnings.clone(), Some(WARNING_TTL));
        Ok(warnings)
    }

    /// Drop every cached payload.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const API_KEY: &str = "0123456789abcdef0123456789abcdef";

    fn service_for(server: &MockServer) -> WeatherService {
        let api = WeatherApiConfig::new(&server.uri());
        let request = RequestConfig::new(API_KEY);
        WeatherService::new(api, &request).unwrap()
    }

    fn now_body() -> serde_json::Value {
        serde_json::json!({
            "code": "200",
            "now": {
                "obsTime": "2024-06-01T11:50+08:00",
                "temp": "18",
                "feelsLike": "17",
                "icon": "101",
                "text": "Cloudy",
                "wind360": "0",
                "windDir": "N",
                "windScale": "2",
                "windSpeed": "8",
                "humidity": "60",
                "precip": "0.0",
                "pressure": "1010",
                "vis": "25"
            }
        })
    }

    #[tokio::test]
    async fn test_current_weather_fetches_and_caches() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v7/weather/now"))
            .and(query_param("location", "101020300"))
            .and(query_param("key", API_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(now_body()))
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server);
        let first = service.current_weather("101020300", false).await.unwrap();
        assert_eq!(first.temp, "18");

        // Second call is served from cache; the mock allows one request only.
        let second = service.current_weather("101020300", false).await.unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v7/weather/now"))
            .respond_with(ResponseTemplate::new(200).set_body_json(now_body()))
            .expect(2)
            .mount(&server)
            .await;

        let service = service_for(&server);
        service.current_weather("101020300", false).await.unwrap();
        service.current_weather("101020300", true).await.unwrap();
    }

    #[tokio::test]
    async fn test_no_data_code_maps_to_data_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v7/weather/7d"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"code": "204"})))
            .mount(&server)
            .await;

        let service = service_for(&server);
        let err = service.daily_forecast("101020300", false).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::DataNotFound);
    }

    #[tokio::test]
    async fn test_error_code_maps_to_request_failed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v7/weather/24h"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"code": "402"})))
            .mount(&server)
            .await;

        let service = service_for(&server);
        let err = service.hourly_forecast("101020300", false).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ApiRequestFailed);
    }

    #[tokio::test]
    async fn test_warnings_empty_list_is_ok() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v7/warning/now"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"code": "200", "warning": []})),
            )
            .mount(&server)
            .await;

        let service = service_for(&server);
        let warnings = service.warnings("101020300", false).await.unwrap();
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_clear_cache_forces_refetch() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v7/air/now"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": "200",
                "now": {
                    "aqi": "42", "category": "Good",
                    "pm2p5": "10", "pm10": "20",
                    "no2": "12", "so2": "3", "co": "0.5", "o3": "80"
                }
            })))
            .expect(2)
            .mount(&server)
            .await;

        let service = service_for(&server);
        service.air_quality("101020300", false).await.unwrap();
        service.clear_cache();
        let air = service.air_quality("101020300", false).await.unwrap();
        assert_eq!(air.aqi, "42");
    }
}
