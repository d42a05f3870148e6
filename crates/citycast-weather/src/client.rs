//! OpenWeather HTTP client: geocoding by name and current weather by coordinate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use citycast_core::{ApiConfig, FetchError, Units};
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use crate::types::{GeoLocation, WeatherResponse, WeatherSnapshot};

const USER_AGENT: &str = concat!("citycast/", env!("CARGO_PKG_VERSION"));

/// The two remote calls the fetch coordinator sequences.
///
/// Both are single-shot: no retries, no caching. A geocode that matches
/// nothing is `Ok(vec![])`; deciding what that means is the caller's job.
#[async_trait]
pub trait RemoteWeatherClient: Send + Sync {
    async fn geocode(
        &self,
        api_key: &str,
        city_name: &str,
        limit: u32,
    ) -> Result<Vec<GeoLocation>, FetchError>;

    async fn get_weather(
        &self,
        api_key: &str,
        latitude: f64,
        longitude: f64,
        units: Units,
    ) -> Result<WeatherSnapshot, FetchError>;
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_fetch_error(self) -> FetchError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_fetch_error(self) -> FetchError {
        // The request URL carries the API key in its query string.
        let err = self.without_url();
        if let Some(status) = err.status() {
            FetchError::http(status.as_u16(), status.canonical_reason())
        } else if err.is_decode() {
            FetchError::MalformedResponse(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// [`RemoteWeatherClient`] backed by the OpenWeather REST API.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: Arc<Client>,
    geocode_url: Url,
    weather_url: Url,
}

impl OpenWeatherClient {
    /// Create a client from the `[api]` config section.
    pub fn new(config: &ApiConfig) -> Result<Self, FetchError> {
        Self::with_base_urls(
            &config.location_base_url,
            &config.weather_base_url,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Create a client against explicit endpoint roots (`/direct` and `/weather` are appended).
    pub fn with_base_urls(
        location_base_url: &str,
        weather_base_url: &str,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to create HTTP client: {}", e)))?;

        let geocode_url = endpoint(location_base_url, "direct")?;
        let weather_url = endpoint(weather_base_url, "weather")?;
        tracing::debug!("Geocode endpoint: {}", geocode_url);
        tracing::debug!("Weather endpoint: {}", weather_url);

        Ok(Self {
            client: Arc::new(client),
            geocode_url,
            weather_url,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .query(query)
            .send()
            .await
            .map_err(ReqwestErrorExt::into_fetch_error)?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("{} returned status {}", url.path(), status);
            return Err(FetchError::http(status.as_u16(), status.canonical_reason()));
        }

        let body = response
            .text()
            .await
            .map_err(ReqwestErrorExt::into_fetch_error)?;

        serde_json::from_str(&body).map_err(|e| FetchError::MalformedResponse(e.to_string()))
    }
}

fn endpoint(base_url: &str, path: &str) -> Result<Url, FetchError> {
    let joined = format!("{}/{}", base_url.trim_end_matches('/'), path);
    Url::parse(&joined).map_err(|e| FetchError::Transport(format!("invalid URL {}: {}", joined, e)))
}

#[async_trait]
impl RemoteWeatherClient for OpenWeatherClient {
    async fn geocode(
        &self,
        api_key: &str,
        city_name: &str,
        limit: u32,
    ) -> Result<Vec<GeoLocation>, FetchError> {
        tracing::debug!("Geocoding \"{}\" (limit {})", city_name, limit);

        let locations: Vec<GeoLocation> = self
            .get_json(
                &self.geocode_url,
                &[
                    ("appid", api_key.to_string()),
                    ("q", city_name.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        tracing::debug!("Geocode returned {} candidates", locations.len());
        Ok(locations)
    }

    async fn get_weather(
        &self,
        api_key: &str,
        latitude: f64,
        longitude: f64,
        units: Units,
    ) -> Result<WeatherSnapshot, FetchError> {
        tracing::debug!("Fetching weather for {}, {}", latitude, longitude);

        let response: WeatherResponse = self
            .get_json(
                &self.weather_url,
                &[
                    ("appid", api_key.to_string()),
                    ("lat", latitude.to_string()),
                    ("lon", longitude.to_string()),
                    ("units", units.as_query().to_string()),
                ],
            )
            .await?;

        let snapshot = WeatherSnapshot::try_from(response)?;
        tracing::info!(
            "Weather for {}: {} {}",
            snapshot.city_name,
            snapshot.temperature,
            snapshot.condition_description
        );
        Ok(snapshot)
    }
}
