mod report;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use citycast_core::{Config, ConfigError};
use citycast_services::{
    CityPreferenceStore, ConnectivityMonitor, FetchCoordinator, FetchOutcome, FetchSettings,
    FileCityStore, ProbeConnectivityMonitor, SharedConnectivity,
};
use citycast_weather::OpenWeatherClient;
use clap::Parser;

/// How long to wait for the last city to reach disk before exiting.
const PERSIST_GRACE: Duration = Duration::from_secs(2);

/// Current weather for a city, via OpenWeather
#[derive(Parser, Debug)]
#[command(name = "citycast")]
#[command(about = "Look up the current weather for a city")]
struct Args {
    /// City to look up; defaults to the last city queried
    city: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Treat the network as unavailable
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let (config, validation) = match Config::load_validated(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            if let Some(config_error) = e.downcast_ref::<ConfigError>() {
                eprintln!("{}", config_error.user_message());
            }
            return Err(e);
        }
    };
    citycast_core::init(&config.logging.filter)?;
    for warning in &validation.warnings {
        tracing::warn!("Config warning: {}", warning);
    }

    let connectivity: Arc<dyn ConnectivityMonitor> = if args.offline {
        Arc::new(SharedConnectivity::new(false))
    } else {
        Arc::new(ProbeConnectivityMonitor::start(&config.connectivity).await)
    };
    let store = Arc::new(
        FileCityStore::open(config.preferences_path(), &config.preferences.default_city).await,
    );
    tracing::debug!("Last city stored in {}", store.path().display());
    let client = match OpenWeatherClient::new(&config.api) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Err(e.into());
        }
    };

    let requested = args
        .city
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    // A city on the command line replaces the stored one outright.
    let settings = FetchSettings {
        auto_fetch_stored_city: requested.is_none(),
        ..FetchSettings::from_config(&config.api)
    };
    let coordinator = FetchCoordinator::start(client, store.clone(), connectivity, settings);
    let mut location = coordinator.location();
    let mut weather = coordinator.weather();

    if let Some(city) = &requested {
        tracing::info!("Looking up \"{}\"", city);
        let _ = coordinator.fetch_by_city_name(city);
    } else {
        tracing::info!("Looking up last city \"{}\"", store.current());
    }

    let succeeded = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break false;
            }
            next = location.next() => match next {
                Some(FetchOutcome::Pending) => println!("Resolving city..."),
                Some(FetchOutcome::Succeeded(candidates)) => {
                    print!("{}", report::format_candidates(&candidates));
                }
                Some(FetchOutcome::Failed(reason)) => {
                    eprintln!("{}", reason);
                    break false;
                }
                Some(FetchOutcome::Idle) => {}
                None => break false,
            },
            next = weather.next() => match next {
                Some(FetchOutcome::Pending) => println!("Fetching weather..."),
                Some(FetchOutcome::Succeeded(snapshot)) => {
                    print!(
                        "{}",
                        report::format_weather(&snapshot, config.api.units, &config.api.icon_base_url)
                    );
                    break true;
                }
                Some(FetchOutcome::Failed(reason)) => {
                    eprintln!("{}", reason);
                    break false;
                }
                Some(FetchOutcome::Idle) => {}
                None => break false,
            },
        }
    };

    if let Some(city) = requested {
        let mut stored = store.read();
        if tokio::time::timeout(PERSIST_GRACE, stored.wait_for(|c| *c == city))
            .await
            .is_err()
        {
            tracing::warn!("Last city was not saved before exit");
        }
    }

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
