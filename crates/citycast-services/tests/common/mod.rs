//! In-process fakes for driving the coordinator without a network.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use citycast_core::{FetchError, Units};
use citycast_services::{
    CityPreferenceStore, FetchCoordinator, FetchSettings, Observable, SharedConnectivity,
    Subscription, LOADING_PLACEHOLDER,
};
use citycast_weather::{GeoLocation, RemoteWeatherClient, WeatherSnapshot};
use parking_lot::Mutex;
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Geocode(String),
    Weather(f64, f64),
}

/// Remote client with scripted answers.
///
/// Unknown cities geocode to an empty list. Weather succeeds with a snapshot
/// built from the requested coordinates unless an error is scripted.
#[derive(Default)]
pub struct FakeWeatherClient {
    geocode: Mutex<HashMap<String, Result<Vec<GeoLocation>, FetchError>>>,
    weather_error: Mutex<Option<FetchError>>,
    geocode_gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    weather_gate: Mutex<Option<oneshot::Receiver<()>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeWeatherClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_city(&self, city: &str, candidates: Vec<GeoLocation>) {
        self.geocode.lock().insert(city.to_string(), Ok(candidates));
    }

    pub fn with_geocode_error(&self, city: &str, error: FetchError) {
        self.geocode.lock().insert(city.to_string(), Err(error));
    }

    pub fn with_weather_error(&self, error: FetchError) {
        *self.weather_error.lock() = Some(error);
    }

    /// Hold the next geocode for `city` until the returned sender fires.
    pub fn hold_geocode(&self, city: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.geocode_gates.lock().insert(city.to_string(), rx);
        tx
    }

    /// Hold the next weather call until the returned sender fires.
    pub fn hold_weather(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.weather_gate.lock() = Some(rx);
        tx
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn weather_calls(&self) -> Vec<(f64, f64)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Weather(lat, lon) => Some((*lat, *lon)),
                Call::Geocode(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl RemoteWeatherClient for FakeWeatherClient {
    async fn geocode(
        &self,
        _api_key: &str,
        city_name: &str,
        _limit: u32,
    ) -> Result<Vec<GeoLocation>, FetchError> {
        self.calls.lock().push(Call::Geocode(city_name.to_string()));

        let gate = self.geocode_gates.lock().remove(city_name);
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        self.geocode
            .lock()
            .get(city_name)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn get_weather(
        &self,
        _api_key: &str,
        latitude: f64,
        longitude: f64,
        _units: Units,
    ) -> Result<WeatherSnapshot, FetchError> {
        self.calls.lock().push(Call::Weather(latitude, longitude));

        let gate = self.weather_gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        if let Some(error) = self.weather_error.lock().clone() {
            return Err(error);
        }
        Ok(snapshot_at(latitude, longitude))
    }
}

/// Preference store that records every write attempt.
pub struct FakeCityStore {
    city: Observable<String>,
    log: Mutex<Vec<String>>,
    writes: Observable<Vec<String>>,
    write_gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    fail_writes: AtomicBool,
}

impl FakeCityStore {
    pub fn new(initial: &str) -> Arc<Self> {
        Arc::new(Self {
            city: Observable::new(initial.to_string()),
            log: Mutex::new(Vec::new()),
            writes: Observable::new(Vec::new()),
            write_gates: Mutex::new(HashMap::new()),
            fail_writes: AtomicBool::new(false),
        })
    }

    /// A store that has not reported its value yet.
    pub fn loading() -> Arc<Self> {
        Self::new(LOADING_PLACEHOLDER)
    }

    pub fn failing() -> Arc<Self> {
        let store = Self::loading();
        store.fail_writes.store(true, Ordering::SeqCst);
        store
    }

    /// Emit a value on the read stream as if it was loaded from disk.
    pub fn publish(&self, city: &str) {
        self.city.set(city.to_string());
    }

    /// Hold the next write of `city` until the returned sender fires.
    pub fn hold_write(&self, city: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.write_gates.lock().insert(city.to_string(), rx);
        tx
    }

    pub fn current(&self) -> String {
        self.city.get()
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.get()
    }

    /// Wait until at least `count` write attempts have been made.
    pub async fn wait_for_writes(&self, count: usize) -> Vec<String> {
        let mut sub = self.writes.subscribe();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            sub.wait_for(|w| w.len() >= count),
        )
        .await
        .expect("timed out waiting for store writes")
        .expect("write stream closed")
    }
}

#[async_trait]
impl CityPreferenceStore for FakeCityStore {
    fn read(&self) -> Subscription<String> {
        self.city.subscribe()
    }

    async fn write(&self, city: &str) -> Result<(), FetchError> {
        let gate = self.write_gates.lock().remove(city);
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        {
            let mut log = self.log.lock();
            log.push(city.to_string());
            self.writes.set(log.clone());
        }

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FetchError::Persistence("disk full".to_string()));
        }
        self.city.set_if_changed(city.to_string());
        Ok(())
    }
}

pub fn london() -> GeoLocation {
    GeoLocation {
        name: "London".to_string(),
        country: "GB".to_string(),
        state: Some("England".to_string()),
        latitude: 51.5074,
        longitude: -0.1278,
    }
}

pub fn paris() -> GeoLocation {
    GeoLocation {
        name: "Paris".to_string(),
        country: "FR".to_string(),
        state: None,
        latitude: 48.8566,
        longitude: 2.3522,
    }
}

/// Snapshot named after the city whose coordinates were requested.
pub fn snapshot_at(latitude: f64, longitude: f64) -> WeatherSnapshot {
    let (city_name, country_code) = if (latitude - london().latitude).abs() < 1e-6 {
        ("London", "GB")
    } else if (latitude - paris().latitude).abs() < 1e-6 {
        ("Paris", "FR")
    } else {
        ("Somewhere", "")
    };

    WeatherSnapshot {
        city_name: city_name.to_string(),
        country_code: country_code.to_string(),
        temperature: 14.2,
        feels_like: 13.6,
        temp_min: 12.0,
        temp_max: 16.1,
        humidity: 72,
        pressure: 1012,
        wind_speed: 4.1,
        wind_direction: 240,
        latitude,
        longitude,
        condition_code: 500,
        condition_icon: "10d".to_string(),
        condition_description: "light rain".to_string(),
        cloud_cover_percent: 75,
        visibility_meters: 10000,
        sunrise_epoch: 1_700_000_000,
        sunset_epoch: 1_700_030_000,
        captured_at_epoch: 1_700_010_000,
    }
}

pub struct Harness {
    pub coordinator: FetchCoordinator,
    pub client: Arc<FakeWeatherClient>,
    pub store: Arc<FakeCityStore>,
    pub connectivity: Arc<SharedConnectivity>,
}

impl Harness {
    /// Online coordinator whose store has not loaded yet, so nothing auto-fetches.
    pub fn online() -> Self {
        Self::build(FakeCityStore::loading(), true)
    }

    pub fn offline() -> Self {
        Self::build(FakeCityStore::loading(), false)
    }

    pub fn build(store: Arc<FakeCityStore>, online: bool) -> Self {
        Self::build_with(store, online, true)
    }

    pub fn build_with(store: Arc<FakeCityStore>, online: bool, auto_fetch: bool) -> Self {
        let client = FakeWeatherClient::new();
        client.with_city("London", vec![london()]);
        client.with_city("Paris", vec![paris()]);

        let connectivity = Arc::new(SharedConnectivity::new(online));
        let coordinator = FetchCoordinator::start(
            client.clone(),
            store.clone(),
            connectivity.clone(),
            FetchSettings {
                api_key: "test-key".to_string(),
                units: Units::Metric,
                geocode_limit: 1,
                auto_fetch_stored_city: auto_fetch,
            },
        );

        Self {
            coordinator,
            client,
            store,
            connectivity,
        }
    }
}

/// Await the next value matching `predicate`, failing the test after five seconds.
pub async fn wait_until<T, F>(sub: &mut Subscription<T>, predicate: F) -> T
where
    T: Clone,
    F: FnMut(&T) -> bool,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), sub.wait_for(predicate))
        .await
        .expect("timed out waiting for value")
        .expect("stream closed")
}
