//! Last queried city, persisted as a single durable value.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use citycast_core::FetchError;
use serde::{Deserialize, Serialize};

use crate::observable::{Observable, Subscription};

/// City used when nothing has been stored yet.
pub const DEFAULT_CITY: &str = "New York";

/// Placeholder shown before the stored city is known. Never a real query.
pub const LOADING_PLACEHOLDER: &str = "Loading...";

#[async_trait]
pub trait CityPreferenceStore: Send + Sync {
    /// Stored city now, then on every change.
    fn read(&self) -> Subscription<String>;

    /// Persist `city`. Readers see it only after this returns `Ok`.
    async fn write(&self, city: &str) -> Result<(), FetchError>;
}

/// In-process store; nothing survives a restart.
#[derive(Debug)]
pub struct MemoryCityStore {
    city: Observable<String>,
}

impl MemoryCityStore {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            city: Observable::new(initial.into()),
        }
    }

    pub fn current(&self) -> String {
        self.city.get()
    }
}

impl Default for MemoryCityStore {
    fn default() -> Self {
        Self::new(DEFAULT_CITY)
    }
}

#[async_trait]
impl CityPreferenceStore for MemoryCityStore {
    fn read(&self) -> Subscription<String> {
        self.city.subscribe()
    }

    async fn write(&self, city: &str) -> Result<(), FetchError> {
        self.city.set_if_changed(city.to_string());
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_city: Option<String>,
}

/// Store backed by a small JSON file.
#[derive(Debug)]
pub struct FileCityStore {
    path: PathBuf,
    city: Observable<String>,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileCityStore {
    /// Open the store at `path`, loading whatever is there.
    ///
    /// A missing, unreadable or corrupt file yields `default_city`; only the
    /// latter two are logged.
    pub async fn open(path: impl Into<PathBuf>, default_city: &str) -> Self {
        let path = path.into();
        let city = match load(&path).await {
            Ok(Some(city)) => {
                tracing::debug!("Loaded last city \"{}\" from {:?}", city, path);
                city
            }
            Ok(None) => default_city.to_string(),
            Err(e) => {
                tracing::warn!("Failed to load preferences from {:?}: {}", path, e);
                default_city.to_string()
            }
        };

        Self {
            path,
            city: Observable::new(city),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> String {
        self.city.get()
    }
}

async fn load(path: &Path) -> Result<Option<String>, String> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.to_string()),
    };

    let stored: StoredPreferences = serde_json::from_str(&contents).map_err(|e| e.to_string())?;
    Ok(stored.last_city.filter(|c| !c.trim().is_empty()))
}

async fn save(path: &Path, city: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let stored = StoredPreferences {
        last_city: Some(city.to_string()),
    };
    let json = serde_json::to_string_pretty(&stored)?;

    // Write-then-rename so a crash never leaves a half-written file behind.
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await
}

#[async_trait]
impl CityPreferenceStore for FileCityStore {
    fn read(&self) -> Subscription<String> {
        self.city.subscribe()
    }

    async fn write(&self, city: &str) -> Result<(), FetchError> {
        let _guard = self.write_lock.lock().await;

        save(&self.path, city)
            .await
            .map_err(|e| FetchError::Persistence(format!("{}: {}", self.path.display(), e)))?;

        tracing::debug!("Stored last city \"{}\"", city);
        self.city.set_if_changed(city.to_string());
        Ok(())
    }
}
