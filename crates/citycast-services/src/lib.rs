pub mod connectivity;
pub mod coordinator;
pub mod observable;
pub mod outcome;
pub mod preferences;

pub use connectivity::{ConnectivityMonitor, ProbeConnectivityMonitor, SharedConnectivity};
pub use coordinator::{FetchCoordinator, FetchSettings, FetchTask, LocationOutcome, WeatherOutcome};
pub use observable::{Observable, Subscription};
pub use outcome::FetchOutcome;
pub use preferences::{
    CityPreferenceStore, FileCityStore, MemoryCityStore, DEFAULT_CITY, LOADING_PLACEHOLDER,
};
