//! Weather data for Citycast
//!
//! Geocodes city names and fetches current conditions from OpenWeather.

pub mod client;
pub mod types;

pub use client::{OpenWeatherClient, RemoteWeatherClient, ReqwestErrorExt};
pub use types::{GeoLocation, WeatherSnapshot};
