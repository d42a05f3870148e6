use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Environment variable that overrides `api.api_key`.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Measurement system requested from the weather provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    Standard,
}

impl Units {
    /// Value of the `units` query parameter.
    pub fn as_query(self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Standard => "standard",
        }
    }

    /// Suffix for rendering temperatures in this unit system.
    pub fn temperature_suffix(self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
            Units::Standard => "K",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Remote weather provider settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Reachability probing
    #[serde(default)]
    pub connectivity: ConnectivityConfig,

    /// Last-city persistence
    #[serde(default)]
    pub preferences: PreferencesConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// OpenWeather API key (can also be set via `OPENWEATHER_API_KEY`)
    #[serde(default)]
    pub api_key: String,

    /// Geocoding endpoint root; `/direct` is appended
    #[serde(default = "default_location_base_url")]
    pub location_base_url: String,

    /// Weather endpoint root; `/weather` is appended
    #[serde(default = "default_weather_base_url")]
    pub weather_base_url: String,

    /// Root for condition icons, consumed by presentation only
    #[serde(default = "default_icon_base_url")]
    pub icon_base_url: String,

    #[serde(default)]
    pub units: Units,

    /// Number of geocoding candidates requested; only the first is used
    #[serde(default = "default_geocode_limit")]
    pub geocode_limit: u32,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_location_base_url() -> String {
    "https://api.openweathermap.org/geo/1.0".to_string()
}

fn default_weather_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_icon_base_url() -> String {
    "https://openweathermap.org/img/wn".to_string()
}

fn default_geocode_limit() -> u32 {
    1
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            location_base_url: default_location_base_url(),
            weather_base_url: default_weather_base_url(),
            icon_base_url: default_icon_base_url(),
            units: Units::default(),
            geocode_limit: default_geocode_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    /// Check if an API key is configured (not empty or a placeholder)
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_key.starts_with("YOUR_")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// Host dialed to decide reachability
    #[serde(default = "default_probe_host")]
    pub probe_host: String,

    #[serde(default = "default_probe_port")]
    pub probe_port: u16,

    /// Seconds between probes
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Seconds before a single probe counts as failed
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

fn default_probe_host() -> String {
    "api.openweathermap.org".to_string()
}

fn default_probe_port() -> u16 {
    443
}

fn default_interval_secs() -> u64 {
    10
}

fn default_probe_timeout_secs() -> u64 {
    3
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_host: default_probe_host(),
            probe_port: default_probe_port(),
            interval_secs: default_interval_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferencesConfig {
    /// File (inside `config_dir`) holding the last queried city
    #[serde(default = "default_preferences_file")]
    pub file_name: String,

    /// City used when nothing has been stored yet
    #[serde(default = "default_city")]
    pub default_city: String,
}

fn default_preferences_file() -> String {
    "settings.json".to_string()
}

fn default_city() -> String {
    "New York".to_string()
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            file_name: default_preferences_file(),
            default_city: default_city(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("citycast");

        Self {
            config_dir,
            api: ApiConfig::default(),
            connectivity: ConnectivityConfig::default(),
            preferences: PreferencesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config.with_env_overrides());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let config: Config =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config.with_env_overrides())
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings, which the caller
    /// reports once logging is up. Returns an error if validation fails with
    /// critical errors.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        Ok((config, validation))
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.api.api_key = key;
            }
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.api.location_base_url, "api.location_base_url", &mut result);
        self.validate_url(&self.api.weather_base_url, "api.weather_base_url", &mut result);
        self.validate_url(&self.api.icon_base_url, "api.icon_base_url", &mut result);

        if !self.api.has_api_key() {
            result.add_warning(
                "api.api_key",
                format!("API key not configured - set it here or via {}", API_KEY_ENV),
            );
        }

        if self.api.geocode_limit == 0 {
            result.add_error("api.geocode_limit", "Geocode limit must be at least 1");
        } else if self.api.geocode_limit > 5 {
            result.add_warning(
                "api.geocode_limit",
                "Provider returns at most 5 candidates; only the first is used",
            );
        }

        if self.api.timeout_secs == 0 {
            result.add_error("api.timeout_secs", "Request timeout must be greater than 0");
        }

        if self.connectivity.probe_host.trim().is_empty() {
            result.add_error("connectivity.probe_host", "Probe host must not be empty");
        }
        if self.connectivity.probe_port == 0 {
            result.add_error("connectivity.probe_port", "Port cannot be 0");
        }
        if self.connectivity.interval_secs == 0 {
            result.add_error(
                "connectivity.interval_secs",
                "Probe interval must be greater than 0",
            );
        }
        if self.connectivity.probe_timeout_secs == 0 {
            result.add_error(
                "connectivity.probe_timeout_secs",
                "Probe timeout must be greater than 0",
            );
        } else if self.connectivity.probe_timeout_secs > self.connectivity.interval_secs {
            result.add_warning(
                "connectivity.probe_timeout_secs",
                "Probe timeout exceeds the probe interval",
            );
        }

        if self.preferences.file_name.trim().is_empty() {
            result.add_error("preferences.file_name", "File name must not be empty");
        }
        if self.preferences.default_city.trim().is_empty() {
            result.add_error("preferences.default_city", "Default city must not be empty");
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Path of the file holding the last queried city
    pub fn preferences_path(&self) -> PathBuf {
        self.config_dir.join(&self.preferences.file_name)
    }

    /// Save configuration to a file
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("citycast");

        Ok(config_dir.join("config.toml"))
    }
}
