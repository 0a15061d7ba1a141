//! IP-based geolocation over public lookup services.
//!
//! Tries a fixed cascade of providers and returns the first plausible
//! coordinate pair. Each provider exposes a different response shape, so a
//! provider carries its shape alongside its URL.

use std::time::Duration;

use tracing::instrument;

use skycast_core::error::{ApiError, Error, ErrorCode};
use skycast_core::{HttpClient, RequestOptions};

use crate::types::Coordinates;

/// How a provider encodes coordinates in its JSON response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `{"latitude": 31.4, "longitude": 121.4}` (ipapi.co)
    LatitudeLongitude,
    /// `{"loc": "31.4,121.4"}` (ipinfo.io)
    CommaSeparatedLoc,
    /// `{"lat": 31.4, "lon": 121.4}` (ip-api.com)
    LatLon,
}

#[derive(Debug, Clone)]
pub struct IpProvider {
    pub base_url: String,
    pub endpoint: String,
    pub shape: ResponseShape,
}

impl IpProvider {
    pub fn new(base_url: impl Into<String>, endpoint: impl Into<String>, shape: ResponseShape) -> Self {
        Self {
            base_url: base_url.into(),
            endpoint: endpoint.into(),
            shape,
        }
    }

    fn parse(&self, value: &serde_json::Value) -> Option<Coordinates> {
        let (latitude, longitude) = match self.shape {
            ResponseShape::LatitudeLongitude => {
                (value["latitude"].as_f64()?, value["longitude"].as_f64()?)
            }
            ResponseShape::CommaSeparatedLoc => {
                let loc = value["loc"].as_str()?;
                let (lat, lon) = loc.split_once(',')?;
                (lat.trim().parse().ok()?, lon.trim().parse().ok()?)
            }
            ResponseShape::LatLon => (value["lat"].as_f64()?, value["lon"].as_f64()?),
        };
        if latitude.is_finite() && longitude.is_finite() {
            Some(Coordinates { latitude, longitude })
        } else {
            None
        }
    }
}

fn default_providers() -> Vec<IpProvider> {
    vec![
        IpProvider::new("https://ipapi.co", "/json", ResponseShape::LatitudeLongitude),
        IpProvider::new("https://ipinfo.io", "/json", ResponseShape::CommaSeparatedLoc),
        IpProvider::new("https://ip-api.com", "/json", ResponseShape::LatLon),
    ]
}

/// Coarse device location from the caller's public IP.
pub struct IpLocationService {
    providers: Vec<IpProvider>,
}

impl Default for IpLocationService {
    fn default() -> Self {
        Self::new(default_providers())
    }
}

impl IpLocationService {
    pub fn new(providers: Vec<IpProvider>) -> Self {
        Self { providers }
    }

    /// Ask each provider in order; first plausible answer wins.
    ///
    /// Provider clients run a single attempt each since the cascade itself
    /// is the fallback path. All providers failing surfaces as
    /// `LOCATION_UNAVAILABLE`.
    #[instrument(skip(self), level = "info")]
    pub async fn locate(&self) -> Result<Coordinates, Error> {
        for provider in &self.providers {
            let client = match HttpClient::new(&provider.base_url) {
                Ok(client) => client
                    .with_service("IpGeolocation")
                    .with_timeout(Duration::from_secs(5))
                    .with_retries(1),
                Err(err) => {
                    tracing::debug!(provider = %provider.base_url, error = %err, "provider misconfigured");
                    continue;
                }
            };

            match client
                .get::<serde_json::Value>(&provider.endpoint, &[], &RequestOptions::default())
                .await
            {
                Ok(value) => {
                    if let Some(coords) = provider.parse(&value) {
                        tracing::debug!(provider = %provider.base_url, "IP geolocation succeeded");
                        return Ok(coords);
                    }
                    tracing::debug!(provider = %provider.base_url, "provider response unusable");
                }
                Err(err) => {
                    tracing::debug!(provider = %provider.base_url, error = %err, "provider failed");
                }
            }
        }

        Err(ApiError::new(
            "IpGeolocation",
            "all IP geolocation providers failed",
            ErrorCode::LocationUnavailable,
        )
        .into())
    }
}
