use chrono::{DateTime, Utc};
use citycast_core::FetchError;
use serde::{Deserialize, Serialize};

/// A geocoding candidate for a free-text city query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub name: String,
    #[serde(default)]
    pub country: String,
    /// Omitted by the provider for many places outside federal countries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
}

impl GeoLocation {
    /// "London, GB" or "Springfield, Illinois, US"
    pub fn display_name(&self) -> String {
        let mut parts = vec![self.name.as_str()];
        if let Some(state) = self.state.as_deref().filter(|s| !s.is_empty()) {
            parts.push(state);
        }
        if !self.country.is_empty() {
            parts.push(&self.country);
        }
        parts.join(", ")
    }
}

/// Current conditions for one coordinate, as returned by the weather call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city_name: String,
    pub country_code: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    /// Percent
    pub humidity: u8,
    /// hPa
    pub pressure: u32,
    pub wind_speed: f64,
    /// Meteorological degrees
    pub wind_direction: u16,
    pub latitude: f64,
    pub longitude: f64,
    pub condition_code: u32,
    pub condition_icon: String,
    pub condition_description: String,
    pub cloud_cover_percent: u8,
    pub visibility_meters: u32,
    pub sunrise_epoch: i64,
    pub sunset_epoch: i64,
    pub captured_at_epoch: i64,
}

impl WeatherSnapshot {
    /// Icon image URL for the primary condition, e.g. `.../img/wn/10d@2x.png`.
    pub fn icon_url(&self, icon_base_url: &str) -> String {
        format!(
            "{}/{}@2x.png",
            icon_base_url.trim_end_matches('/'),
            self.condition_icon
        )
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.captured_at_epoch, 0)
    }

    pub fn sunrise(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.sunrise_epoch, 0)
    }

    pub fn sunset(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.sunset_epoch, 0)
    }
}

// Wire format of the current-weather endpoint. Only the fields we keep are modelled.

#[derive(Debug, Deserialize)]
pub(crate) struct WeatherResponse {
    coord: WireCoord,
    #[serde(default)]
    weather: Vec<WireCondition>,
    main: WireMain,
    #[serde(default)]
    visibility: u32,
    #[serde(default)]
    wind: WireWind,
    #[serde(default)]
    clouds: WireClouds,
    dt: i64,
    #[serde(default)]
    sys: WireSys,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct WireCondition {
    id: u32,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct WireMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    pressure: u32,
    humidity: u8,
}

#[derive(Debug, Default, Deserialize)]
struct WireWind {
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: u16,
}

#[derive(Debug, Default, Deserialize)]
struct WireClouds {
    #[serde(default)]
    all: u8,
}

#[derive(Debug, Default, Deserialize)]
struct WireSys {
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    sunrise: i64,
    #[serde(default)]
    sunset: i64,
}

impl TryFrom<WeatherResponse> for WeatherSnapshot {
    type Error = FetchError;

    fn try_from(resp: WeatherResponse) -> Result<Self, Self::Error> {
        let primary = resp.weather.into_iter().next().ok_or_else(|| {
            FetchError::MalformedResponse("weather condition list is empty".to_string())
        })?;

        Ok(Self {
            city_name: resp.name,
            country_code: resp.sys.country.unwrap_or_default(),
            temperature: resp.main.temp,
            feels_like: resp.main.feels_like,
            temp_min: resp.main.temp_min,
            temp_max: resp.main.temp_max,
            humidity: resp.main.humidity,
            pressure: resp.main.pressure,
            wind_speed: resp.wind.speed,
            wind_direction: resp.wind.deg,
            latitude: resp.coord.lat,
            longitude: resp.coord.lon,
            condition_code: primary.id,
            condition_icon: primary.icon,
            condition_description: primary.description,
            cloud_cover_percent: resp.clouds.all,
            visibility_meters: resp.visibility,
            sunrise_epoch: resp.sys.sunrise,
            sunset_epoch: resp.sys.sunset,
            captured_at_epoch: resp.dt,
        })
    }
}
