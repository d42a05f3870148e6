//! Error types shared across the Citycast crates.
//!
//! `FetchError` is the taxonomy every fetch failure is expressed in. Its
//! `Display` text is what lands in a failed outcome slot, so it is written for
//! the user; `user_message()` gives a shorter hint suitable for a status line.

use thiserror::Error;

/// Reason text published when a trigger finds the network unreachable.
pub const NO_CONNECTIVITY_MESSAGE: &str = "No Internet Connection";

/// Failures of the two-stage city → weather lookup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("No Internet Connection")]
    NoConnectivity,

    /// The request never produced an HTTP response (DNS, connect, timeout, TLS).
    #[error("Error: {0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("Error: {message}")]
    Http { status: u16, message: String },

    /// Geocoding succeeded but matched nothing.
    #[error("No results found for \"{query}\"")]
    EmptyResult { query: String },

    /// The body could not be decoded, or lacked a required element.
    #[error("Error: malformed response: {0}")]
    MalformedResponse(String),

    /// Saving the last queried city failed. Logged, never surfaced in a slot.
    #[error("Failed to save city: {0}")]
    Persistence(String),
}

impl FetchError {
    /// Build an HTTP failure from a status code, using its canonical reason phrase.
    pub fn http(status: u16, reason: Option<&str>) -> Self {
        FetchError::Http {
            status,
            message: reason
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status)),
        }
    }

    /// Whether this failure is shown to the user through an outcome slot.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, FetchError::Persistence(_))
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            FetchError::NoConnectivity => "You are offline. Check your connection.",
            FetchError::Transport(_) => "Unable to reach the weather service. Please try again.",
            FetchError::Http { status: 401, .. } => "Weather API key is invalid. Check settings.",
            FetchError::Http { status: 404, .. } => "Location not found. Check and try again.",
            FetchError::Http { status, .. } if *status >= 500 => {
                "The weather service is experiencing issues. Please try again later."
            }
            FetchError::Http { .. } => "The request failed. Please try again.",
            FetchError::EmptyResult { .. } => "No city matched that name. Check the spelling.",
            FetchError::MalformedResponse(_) => {
                "Received an unexpected response. Please try again."
            }
            FetchError::Persistence(_) => "Your last search could not be saved.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read configuration file {path}: {message}")]
    Unreadable { path: String, message: String },

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Unreadable { .. } => "Configuration file could not be read.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
        }
    }
}
