//! City search and lookup against the QWeather geo API.

use std::time::Duration;

use tracing::instrument;

use skycast_core::config::{endpoints, GeoApiConfig, RequestConfig};
use skycast_core::error::{ApiError, Error, ErrorCode};
use skycast_core::{CacheManager, HttpClient, RequestOptions};

use crate::types::{
    CityInfo, CityRange, CitySearchParams, Coordinates, LookupResponse, TopCityResponse,
};
use crate::weather::ensure_ok;

const SERVICE: &str = "QWeatherAPI";

const SEARCH_TTL: Duration = Duration::from_secs(60 * 60);
const TOP_CITIES_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const COORDS_TTL: Duration = Duration::from_secs(6 * 60 * 60);

const MAX_RESULTS: u32 = 20;
const DEFAULT_RESULTS: u32 = 10;

/// City lookup service over the geo API. Caller-constructed, owns its own
/// cache; search results change rarely, so the TTLs run long.
pub struct CityService {
    http: HttpClient,
    cache: CacheManager,
    geo: GeoApiConfig,
    api_key: String,
}

impl CityService {
    pub fn new(geo: GeoApiConfig, request: &RequestConfig) -> Result<Self, Error> {
        let http = HttpClient::new(&geo.base_url)?
            .with_service(SERVICE)
            .with_timeout(request.timeout)
            .with_retries(request.retries);
        Ok(Self {
            http,
            cache: CacheManager::new(request.cache_ttl),
            geo,
            api_key: request.api_key.clone(),
        })
    }

    /// Search cities by free-text query.
    ///
    /// An empty query is rejected before any request goes out; an empty
    /// result set surfaces as `CITY_NOT_FOUND`.
    #[instrument(skip(self, params), level = "info")]
    pub async fn search(&self, params: &CitySearchParams) -> Result<Vec<CityInfo>, Error> {
        let query = params.location.trim();
        if query.is_empty() {
            return Err(
                ApiError::new(SERVICE, "empty search query", ErrorCode::DataInvalid).into(),
            );
        }
        let number = params
            .number
            .unwrap_or(DEFAULT_RESULTS)
            .clamp(1, MAX_RESULTS);
        let cache_key = format!(
            "city_search_{}_{}_{}",
            query,
            params.adm.as_deref().unwrap_or(""),
            number
        );

        if let Some(cached) = self.cache.get::<Vec<CityInfo>>(&cache_key) {
            tracing::debug!(query, "city search served from cache");
            return Ok(cached);
        }

        let endpoint = self.geo.endpoint(endpoints::CITY_LOOKUP);
        let response: LookupResponse = self
            .http
            .get(
                &endpoint,
                &[
                    ("location", Some(query.to_string())),
                    ("key", Some(self.api_key.clone())),
                    ("adm", params.adm.clone()),
                    ("range", Some(params.range.clone().unwrap_or_else(|| "cn".to_string()))),
                    ("number", Some(number.to_string())),
                    ("lang", Some(params.lang.clone().unwrap_or_else(|| "zh".to_string()))),
                ],
                &RequestOptions::default(),
            )
            .await?;

        if response.code == "204" {
            return Err(
                ApiError::new(SERVICE, "no search results", ErrorCode::CityNotFound)
                    .with_endpoint(&endpoint)
                    .into(),
            );
        }
        ensure_ok(&response.code, &endpoint, "no search results")?;

        let cities = response.location.unwrap_or_default();
        if cities.is_empty() {
            return Err(
                ApiError::new(SERVICE, "no matching city", ErrorCode::CityNotFound)
                    .with_endpoint(&endpoint)
                    .into(),
            );
        }
        self.cache.set(&cache_key, cities.clone(), Some(SEARCH_TTL));
        Ok(cities)
    }

    /// Ranked list of major cities.
    #[instrument(skip(self), level = "info")]
    pub async fn top_cities(&self, range: CityRange, number: u32) -> Result<Vec<CityInfo>, Error> {
        let count = number.clamp(1, MAX_RESULTS);
        let cache_key = format!("top_cities_{}_{}", range.as_str(), count);

        if let Some(cached) = self.cache.get::<Vec<CityInfo>>(&cache_key) {
            tracing::debug!(range = range.as_str(), "top cities served from cache");
            return Ok(cached);
        }

        let endpoint = self.geo.endpoint(endpoints::CITY_TOP);
        let response: TopCityResponse = self
            .http
            .get(
                &endpoint,
                &[
                    ("key", Some(self.api_key.clone())),
                    ("range", Some(range.as_str().to_string())),
                    ("number", Some(count.to_string())),
                    ("lang", Some("zh".to_string())),
                ],
                &RequestOptions::default(),
            )
            .await?;

        ensure_ok(&response.code, &endpoint, "no top city data")?;
        let cities = response.top_city_list.unwrap_or_default();
        self.cache.set(&cache_key, cities.clone(), Some(TOP_CITIES_TTL));
        Ok(cities)
    }

    /// Reverse lookup: the city containing the given coordinates.
    #[instrument(skip(self), level = "info")]
    pub async fn by_coordinates(&self, coords: Coordinates) -> Result<CityInfo, Error> {
        // The geo API accepts at most two decimal places.
        let location = format!("{:.2},{:.2}", coords.longitude, coords.latitude);
        let cache_key = format!("city_coords_{location}");

        if let Some(cached) = self.cache.get::<CityInfo>(&cache_key) {
            tracing::debug!(%location, "coordinate lookup served from cache");
            return Ok(cached);
        }

        let endpoint = self.geo.endpoint(endpoints::CITY_LOOKUP);
        let response: LookupResponse = self
            .http
            .get(
                &endpoint,
                &[
                    ("location", Some(location.clone())),
                    ("key", Some(self.api_key.clone())),
                    ("lang", Some("zh".to_string())),
                ],
                &RequestOptions::default(),
            )
            .await?;

        if response.code == "204" {
            return Err(
                ApiError::new(SERVICE, "no city at coordinates", ErrorCode::CityNotFound)
                    .with_endpoint(&endpoint)
                    .into(),
            );
        }
        ensure_ok(&response.code, &endpoint, "no city at coordinates")?;

        let city = response
            .location
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::from(
                    ApiError::new(SERVICE, "no city at coordinates", ErrorCode::CityNotFound)
                        .with_endpoint(&endpoint),
                )
            })?;
        self.cache.set(&cache_key, city.clone(), Some(COORDS_TTL));
        Ok(city)
    }

    /// Drop every cached lookup.
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

    fn service_for(server: &MockServer) -> CityService {
        let geo = GeoApiConfig::new(&server.uri());
        let request = RequestConfig::new(API_KEY);
        CityService::new(geo, &request).unwrap()
    }

    fn shanghai() -> serde_json::Value {
        serde_json::json!({
            "name": "Baoshan",
            "id": "101020300",
            "lat": "31.40",
            "lon": "121.48",
            "adm1": "Shanghai",
            "adm2": "Shanghai",
            "country": "China",
            "tz": "Asia/Shanghai",
            "rank": "13"
        })
    }

    #[tokio::test]
    async fn test_search_clamps_number_and_caches() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/city/lookup"))
            .and(query_param("location", "baoshan"))
            .and(query_param("number", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": "200",
                "location": [shanghai()]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server);
        let params = CitySearchParams {
            location: "baoshan".to_string(),
            number: Some(50),
            ..Default::default()
        };

        let cities = service.search(&params).await.unwrap();
        assert_eq!(cities[0].id, "101020300");

        // Cache hit; the mock permits a single request.
        let again = service.search(&params).await.unwrap();
        assert_eq!(again, cities);
    }

    #[tokio::test]
    async fn test_search_rejects_blank_query_without_request() {
        let server = MockServer::start().await;
        let service = service_for(&server);

        let params = CitySearchParams {
            location: "   ".to_string(),
            ..Default::default()
        };
        let err = service.search(&params).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::DataInvalid);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_no_results_is_city_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/city/lookup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"code": "204"})))
            .mount(&server)
            .await;

        let service = service_for(&server);
        let params = CitySearchParams {
            location: "atlantis".to_string(),
            ..Default::default()
        };
        let err = service.search(&params).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CityNotFound);
    }

    #[tokio::test]
    async fn test_top_cities() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/city/top"))
            .and(query_param("range", "cn"))
            .and(query_param("number", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": "200",
                "topCityList": [shanghai()]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server);
        let cities = service.top_cities(CityRange::China, 5).await.unwrap();
        assert_eq!(cities.len(), 1);
    }

    #[tokio::test]
    async fn test_by_coordinates_rounds_to_two_decimals() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/city/lookup"))
            .and(query_param("location", "121.48,31.40"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": "200",
                "location": [shanghai()]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server);
        let city = service
            .by_coordinates(Coordinates {
                latitude: 31.4042,
                longitude: 121.4812,
            })
            .await
            .unwrap();
        assert_eq!(city.name, "Baoshan");
    }
}
