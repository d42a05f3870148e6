pub mod config;
pub mod error;

pub use config::{
    ApiConfig, Config, ConnectivityConfig, LoggingConfig, PreferencesConfig, Units,
    ValidationResult,
};
pub use error::{ConfigError, FetchError, NO_CONNECTIVITY_MESSAGE};

use anyhow::Result;

/// Initialize logging.
///
/// `RUST_LOG` wins over `default_filter`. Calling this more than once is harmless;
/// only the first subscriber is installed.
pub fn init(default_filter: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
        return Ok(());
    }

    tracing::info!("Citycast core initialized");
    Ok(())
}
