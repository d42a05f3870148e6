//! Fetch coordinator: city name → geocode → weather.
//!
//! Owns the location and weather outcome slots. Each trigger runs its network
//! legs in a spawned task. A trigger claims a slot when it first writes to it,
//! and only the slot's current owner may publish there; a newer claim
//! supersedes an older one. Claims and publishes share one lock. A trigger that
//! never reaches a slot leaves that slot's owner alone, so a fetch still in
//! flight there keeps the right to finish. Superseded calls are not cancelled,
//! their results are just dropped.

use std::future::Future;
use std::sync::{Arc, Weak};

use citycast_core::{ApiConfig, FetchError, Units};
use citycast_weather::{GeoLocation, RemoteWeatherClient, WeatherSnapshot};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::connectivity::ConnectivityMonitor;
use crate::observable::{Observable, Subscription};
use crate::outcome::FetchOutcome;
use crate::preferences::{CityPreferenceStore, LOADING_PLACEHOLDER};

pub type LocationOutcome = FetchOutcome<Vec<GeoLocation>>;
pub type WeatherOutcome = FetchOutcome<WeatherSnapshot>;

/// Request parameters the coordinator passes to the remote client.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub api_key: String,
    pub units: Units,
    pub geocode_limit: u32,
    /// Fetch the stored city once it has loaded, unless a caller triggers first.
    pub auto_fetch_stored_city: bool,
}

impl FetchSettings {
    pub fn from_config(api: &ApiConfig) -> Self {
        Self {
            api_key: api.api_key.clone(),
            units: api.units,
            geocode_limit: api.geocode_limit.max(1),
            auto_fetch_stored_city: true,
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self::from_config(&ApiConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TriggerOrigin {
    User,
    Startup,
}

/// Handle to the network part of a trigger.
///
/// Dropping it detaches the task; the fetch still runs to completion.
#[derive(Debug)]
#[must_use = "dropping a FetchTask detaches it; call `finished()` to wait for the outcome"]
pub struct FetchTask {
    handle: Option<JoinHandle<()>>,
}

impl FetchTask {
    fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: Some(tokio::spawn(future)),
        }
    }

    /// A trigger that finished synchronously (offline, blank city, skipped).
    fn done() -> Self {
        Self { handle: None }
    }

    /// Whether any network call was started for this trigger.
    pub fn started_request(&self) -> bool {
        self.handle.is_some()
    }

    /// Wait until every leg of this trigger has published (or been superseded).
    pub async fn finished(self) {
        if let Some(handle) = self.handle {
            if let Err(e) = handle.await {
                tracing::error!("Fetch task failed: {}", e);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Location,
    Weather,
}

impl Slot {
    fn name(self) -> &'static str {
        match self {
            Slot::Location => "location",
            Slot::Weather => "weather",
        }
    }
}

#[derive(Debug, Default)]
struct PublishState {
    /// Last trigger id handed out.
    last_trigger: u64,
    /// Trigger allowed to publish into the location slot.
    location_owner: u64,
    /// Trigger allowed to publish into the weather slot.
    weather_owner: u64,
    /// Triggers issued by callers, as opposed to the startup auto-fetch.
    user_triggers: u64,
}

impl PublishState {
    fn owner_mut(&mut self, slot: Slot) -> &mut u64 {
        match slot {
            Slot::Location => &mut self.location_owner,
            Slot::Weather => &mut self.weather_owner,
        }
    }
}

struct Inner {
    client: Arc<dyn RemoteWeatherClient>,
    store: Arc<dyn CityPreferenceStore>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    settings: FetchSettings,
    location: Observable<LocationOutcome>,
    weather: Observable<WeatherOutcome>,
    city_name: Observable<String>,
    publish: Mutex<PublishState>,
    /// Cities to persist, written one at a time in trigger order.
    pending_writes: mpsc::UnboundedSender<String>,
    shutdown: CancellationToken,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl Inner {
    /// Hand out a new trigger id.
    ///
    /// The startup auto-fetch is refused once a caller has triggered anything or
    /// the weather slot has left `Idle`.
    fn begin(&self, origin: TriggerOrigin) -> Option<u64> {
        let mut state = self.publish.lock();
        match origin {
            TriggerOrigin::User => state.user_triggers += 1,
            TriggerOrigin::Startup => {
                if state.user_triggers > 0 || !self.weather.get().is_idle() {
                    return None;
                }
            }
        }
        state.last_trigger += 1;
        Some(state.last_trigger)
    }

    /// Take ownership of `slot` for `trigger` and publish its first outcome.
    ///
    /// Fails if a newer trigger already owns the slot, or if `also_owning` is
    /// given and `trigger` no longer owns that slot.
    fn claim<T>(
        &self,
        observable: &Observable<FetchOutcome<T>>,
        slot: Slot,
        trigger: u64,
        also_owning: Option<Slot>,
        outcome: FetchOutcome<T>,
    ) -> bool
    where
        T: Clone + Send + 'static,
    {
        let mut state = self.publish.lock();
        if let Some(other) = also_owning {
            if *state.owner_mut(other) != trigger {
                tracing::debug!(
                    "Trigger {} lost the {} slot, not starting {}",
                    trigger,
                    other.name(),
                    slot.name()
                );
                return false;
            }
        }

        let owner = state.owner_mut(slot);
        if *owner > trigger {
            tracing::debug!(
                "Trigger {} cannot claim {} (owned by {})",
                trigger,
                slot.name(),
                owner
            );
            return false;
        }
        *owner = trigger;
        set_outcome(observable, slot, outcome);
        true
    }

    /// Publish into `slot` if `trigger` still owns it.
    fn publish<T>(
        &self,
        observable: &Observable<FetchOutcome<T>>,
        slot: Slot,
        trigger: u64,
        outcome: FetchOutcome<T>,
    ) -> bool
    where
        T: Clone + Send + 'static,
    {
        let mut state = self.publish.lock();
        let owner = *state.owner_mut(slot);
        if owner != trigger {
            tracing::debug!(
                "Dropping stale {} outcome from trigger {} (owned by {})",
                slot.name(),
                trigger,
                owner
            );
            return false;
        }
        set_outcome(observable, slot, outcome);
        true
    }

    fn persist(&self, city: &str) {
        if self.pending_writes.send(city.to_string()).is_err() {
            tracing::warn!("City writer has stopped; \"{}\" not saved", city);
        }
    }

    async fn run_city(self: Arc<Self>, trigger: u64, city: String) {
        let result = self
            .client
            .geocode(&self.settings.api_key, &city, self.settings.geocode_limit)
            .await;

        let candidates = match result {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!("Geocoding \"{}\" failed: {}", city, e);
                self.publish(&self.location, Slot::Location, trigger, FetchOutcome::failed(&e));
                return;
            }
        };

        let Some(first) = candidates.first().cloned() else {
            let e = FetchError::EmptyResult { query: city };
            tracing::info!("{}", e);
            self.publish(&self.location, Slot::Location, trigger, FetchOutcome::failed(&e));
            return;
        };

        tracing::info!(
            "Resolved \"{}\" to {} ({}, {})",
            city,
            first.display_name(),
            first.latitude,
            first.longitude
        );
        if !self.publish(
            &self.location,
            Slot::Location,
            trigger,
            FetchOutcome::Succeeded(candidates),
        ) {
            return;
        }

        if self.begin_weather(trigger, Some(Slot::Location)) {
            self.run_weather(trigger, first.latitude, first.longitude)
                .await;
        }
    }

    /// Synchronous part of the weather leg: claim the weather slot with
    /// `Pending`, or `Failed` when offline. Returns whether the remote call
    /// should run.
    fn begin_weather(&self, trigger: u64, also_owning: Option<Slot>) -> bool {
        if !self.connectivity.is_connected() {
            self.claim(
                &self.weather,
                Slot::Weather,
                trigger,
                also_owning,
                FetchOutcome::failed(&FetchError::NoConnectivity),
            );
            return false;
        }
        self.claim(
            &self.weather,
            Slot::Weather,
            trigger,
            also_owning,
            FetchOutcome::Pending,
        )
    }

    async fn run_weather(&self, trigger: u64, latitude: f64, longitude: f64) {
        let result = self
            .client
            .get_weather(&self.settings.api_key, latitude, longitude, self.settings.units)
            .await;

        let outcome = match result {
            Ok(snapshot) => FetchOutcome::Succeeded(snapshot),
            Err(e) => {
                tracing::warn!("Weather for {}, {} failed: {}", latitude, longitude, e);
                FetchOutcome::failed(&e)
            }
        };
        self.publish(&self.weather, Slot::Weather, trigger, outcome);
    }
}

/// Write `outcome` into a slot. Callers hold the publish lock.
fn set_outcome<T>(observable: &Observable<FetchOutcome<T>>, slot: Slot, outcome: FetchOutcome<T>)
where
    T: Clone + Send + 'static,
{
    let previous = observable.get();
    if !previous.can_transition_to(&outcome) {
        tracing::warn!(
            "Unexpected {} transition {} -> {}",
            slot.name(),
            previous.label(),
            outcome.label()
        );
    }
    tracing::debug!("{} -> {}", slot.name(), outcome.label());
    observable.set(outcome);
}

/// Sequences the two-stage fetch and exposes its progress.
///
/// Cheap to clone; clones share the same slots.
#[derive(Clone)]
pub struct FetchCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for FetchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("location", &self.inner.location.get().label())
            .field("weather", &self.inner.weather.get().label())
            .field("city_name", &self.inner.city_name.get())
            .finish()
    }
}

impl FetchCoordinator {
    /// Create the coordinator and start following the stored city.
    ///
    /// With `auto_fetch_stored_city`, the first real city the store reports
    /// triggers one automatic fetch, unless a caller got there first. Must run
    /// inside a tokio runtime.
    pub fn start(
        client: Arc<dyn RemoteWeatherClient>,
        store: Arc<dyn CityPreferenceStore>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        settings: FetchSettings,
    ) -> Self {
        let (pending_writes, writes) = mpsc::unbounded_channel();
        tokio::spawn(write_cities(store.clone(), writes));

        let auto_fetch = settings.auto_fetch_stored_city;
        let inner = Arc::new(Inner {
            client,
            store,
            connectivity,
            settings,
            location: Observable::new(FetchOutcome::Idle),
            weather: Observable::new(FetchOutcome::Idle),
            city_name: Observable::new(LOADING_PLACEHOLDER.to_string()),
            publish: Mutex::new(PublishState::default()),
            pending_writes,
            shutdown: CancellationToken::new(),
        });

        let cities = inner.store.read();
        tokio::spawn(follow_stored_city(
            Arc::downgrade(&inner),
            cities,
            auto_fetch,
            inner.shutdown.clone(),
        ));

        Self { inner }
    }

    /// Resolve `city` and fetch its weather.
    ///
    /// The city is trimmed and persisted, then the location slot moves to
    /// `Pending` (or straight to `Failed` when offline) before this returns.
    pub fn fetch_by_city_name(&self, city: &str) -> FetchTask {
        self.trigger(city, TriggerOrigin::User)
    }

    /// Fetch weather for explicit coordinates, bypassing geocoding.
    pub fn fetch_by_coordinates(&self, latitude: f64, longitude: f64) -> FetchTask {
        let Some(trigger) = self.inner.begin(TriggerOrigin::User) else {
            return FetchTask::done();
        };

        if !self.inner.begin_weather(trigger, None) {
            return FetchTask::done();
        }

        let inner = self.inner.clone();
        FetchTask::spawn(async move {
            inner.run_weather(trigger, latitude, longitude).await;
        })
    }

    fn trigger(&self, city: &str, origin: TriggerOrigin) -> FetchTask {
        let city = city.trim();
        if city.is_empty() {
            tracing::warn!("Ignoring fetch for a blank city name");
            return FetchTask::done();
        }
        tracing::debug!("city {}", city);

        let Some(trigger) = self.inner.begin(origin) else {
            tracing::debug!("Skipping automatic fetch for \"{}\"", city);
            return FetchTask::done();
        };

        // The startup city came from the store; writing it back changes nothing.
        if origin == TriggerOrigin::User {
            self.inner.persist(city);
        }

        if !self.inner.connectivity.is_connected() {
            tracing::info!("Offline, not fetching \"{}\"", city);
            self.inner.claim(
                &self.inner.location,
                Slot::Location,
                trigger,
                None,
                FetchOutcome::failed(&FetchError::NoConnectivity),
            );
            return FetchTask::done();
        }

        if !self.inner.claim(
            &self.inner.location,
            Slot::Location,
            trigger,
            None,
            FetchOutcome::Pending,
        ) {
            return FetchTask::done();
        }

        let inner = self.inner.clone();
        let city = city.to_string();
        FetchTask::spawn(inner.run_city(trigger, city))
    }

    /// Location outcomes: current first, then every change.
    pub fn location(&self) -> Subscription<LocationOutcome> {
        self.inner.location.subscribe()
    }

    /// Weather outcomes: current first, then every change.
    pub fn weather(&self) -> Subscription<WeatherOutcome> {
        self.inner.weather.subscribe()
    }

    pub fn location_outcome(&self) -> LocationOutcome {
        self.inner.location.get()
    }

    pub fn weather_outcome(&self) -> WeatherOutcome {
        self.inner.weather.get()
    }

    /// Mirror of the stored city; `"Loading..."` until the store reports.
    pub fn city_name(&self) -> Subscription<String> {
        self.inner.city_name.subscribe()
    }

    pub fn current_city_name(&self) -> String {
        self.inner.city_name.get()
    }

    pub fn is_online(&self) -> bool {
        self.inner.connectivity.is_connected()
    }

    pub fn online(&self) -> Subscription<bool> {
        self.inner.connectivity.subscribe()
    }
}

async fn follow_stored_city(
    weak: Weak<Inner>,
    mut cities: Subscription<String>,
    auto_fetch: bool,
    shutdown: CancellationToken,
) {
    let mut auto_fetch_armed = auto_fetch;

    loop {
        let city = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = cities.next() => match next {
                Some(city) => city,
                None => break,
            },
        };

        let Some(inner) = weak.upgrade() else {
            break;
        };
        inner.city_name.set(city.clone());

        if auto_fetch_armed && city != LOADING_PLACEHOLDER {
            auto_fetch_armed = false;
            tracing::info!("Stored city is \"{}\"", city);
            let coordinator = FetchCoordinator { inner };
            let _ = coordinator.trigger(&city, TriggerOrigin::Startup);
        }
    }

    tracing::debug!("Stopped following stored city");
}

/// Persist queued cities in the order they were triggered.
async fn write_cities(
    store: Arc<dyn CityPreferenceStore>,
    mut writes: mpsc::UnboundedReceiver<String>,
) {
    while let Some(city) = writes.recv().await {
        if let Err(e) = store.write(&city).await {
            tracing::warn!("{}", e);
        }
    }
    tracing::debug!("City writer stopped");
}
