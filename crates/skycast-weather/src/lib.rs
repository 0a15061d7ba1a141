//! QWeather-backed weather, city, and IP-location services for Skycast.
//!
//! Each service owns an HTTP client and a TTL cache from `skycast-core`;
//! construct them with explicit configuration and pass them where needed.

pub mod city;
pub mod location;
pub mod types;
pub mod weather;

pub use city::CityService;
pub use location::{IpLocationService, IpProvider, ResponseShape};
pub use types::*;
pub use weather::WeatherService;
