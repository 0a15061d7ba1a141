//! Serde models for the QWeather v7 API.
//!
//! The upstream API returns every numeric value as a string and wraps each
//! payload in an envelope whose `code` field is the application-level
//! status ("200" success, "204" no data). Fields keep the upstream camelCase
//! names via serde renames; unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// Current observed conditions (`/weather/now`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentWeather {
    pub obs_time: String,
    pub temp: String,
    pub feels_like: String,
    pub icon: String,
    pub text: String,
    pub wind360: String,
    pub wind_dir: String,
    pub wind_scale: String,
    pub wind_speed: String,
    pub humidity: String,
    pub precip: String,
    pub pressure: String,
    pub vis: String,
    #[serde(default)]
    pub cloud: Option<String>,
    #[serde(default)]
    pub dew: Option<String>,
}

/// One day of the 7-day forecast (`/weather/7d`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyForecast {
    pub fx_date: String,
    #[serde(default)]
    pub sunrise: Option<String>,
    #[serde(default)]
    pub sunset: Option<String>,
    pub temp_max: String,
    pub temp_min: String,
    pub icon_day: String,
    pub text_day: String,
    pub icon_night: String,
    pub text_night: String,
    pub wind_dir_day: String,
    pub wind_speed_day: String,
    pub humidity: String,
    pub precip: String,
    pub uv_index: String,
}

/// One hour of the 24-hour forecast (`/weather/24h`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyWeather {
    pub fx_time: String,
    pub temp: String,
    pub icon: String,
    pub text: String,
    pub wind_dir: String,
    pub wind_speed: String,
    pub humidity: String,
    #[serde(default)]
    pub pop: Option<String>,
    #[serde(default)]
    pub precip: Option<String>,
}

/// Real-time air quality (`/air/now`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirQuality {
    pub aqi: String,
    pub category: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub primary: Option<String>,
    pub pm2p5: String,
    pub pm10: String,
    pub no2: String,
    pub so2: String,
    pub co: String,
    pub o3: String,
}

/// Severe weather warning (`/warning/now`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherWarning {
    pub id: String,
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub severity_color: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub type_name: Option<String>,
}

/// A city record from the geo API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityInfo {
    pub name: String,
    pub id: String,
    pub lat: String,
    pub lon: String,
    pub adm1: String,
    pub adm2: String,
    pub country: String,
    #[serde(default)]
    pub tz: Option<String>,
    #[serde(default)]
    pub utc_offset: Option<String>,
    #[serde(default)]
    pub rank: Option<String>,
}

/// Geographic coordinates, decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Scope of the top-cities ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CityRange {
    #[default]
    China,
    World,
}

impl CityRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::China => "cn",
            Self::World => "world",
        }
    }
}

/// Parameters for a city search.
#[derive(Debug, Clone, Default)]
pub struct CitySearchParams {
    /// Free-text query: city name, `lon,lat`, LocationID, or Adcode.
    pub location: String,
    /// Superior administrative division, narrows ambiguous names.
    pub adm: Option<String>,
    pub range: Option<String>,
    /// Result count, clamped to 1..=20 (default 10).
    pub number: Option<u32>,
    pub lang: Option<String>,
}

// Envelope types. Payload fields are optional because "204" responses omit
// them entirely.

#[derive(Debug, Clone, Deserialize)]
pub struct NowResponse {
    pub code: String,
    #[serde(default)]
    pub now: Option<CurrentWeather>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DailyResponse {
    pub code: String,
    #[serde(default)]
    pub daily: Option<Vec<DailyForecast>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HourlyResponse {
    pub code: String,
    #[serde(default)]
    pub hourly: Option<Vec<HourlyWeather>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AirResponse {
    pub code: String,
    #[serde(default)]
    pub now: Option<AirQuality>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WarningResponse {
    pub code: String,
    #[serde(default)]
    pub warning: Option<Vec<WeatherWarning>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LookupResponse {
    pub code: String,
    #[serde(default)]
    pub location: Option<Vec<CityInfo>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopCityResponse {
    pub code: String,
    #[serde(default)]
    pub top_city_list: Option<Vec<CityInfo>>,
}
