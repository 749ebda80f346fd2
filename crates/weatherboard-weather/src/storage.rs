//! Persistence boundary: a key-value byte store holding one JSON snapshot of
//! the dashboard per user token.

use crate::provider::{CurrentResponse, ForecastEntry};
use crate::types::{Coordinates, ForecastSample, Units, WeatherAlert, WeatherSnapshot};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const SNAPSHOT_VERSION: u32 = 1;

const USER_TOKEN_SLOT: &str = "userToken";
const SNAPSHOT_SLOT_PREFIX: &str = "dashboard";

// Per-slot layout written by earlier releases
const LEGACY_WEATHER_SLOT: &str = "weatherData";
const LEGACY_FORECAST_SLOT: &str = "forecastData";
const LEGACY_FAVORITES_SLOT: &str = "favorites";
const LEGACY_HISTORY_SLOT: &str = "searchedLocations";
const LEGACY_ALERTS_SLOT: &str = "weatherAlerts";

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to serialize dashboard state: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Stored slot {slot} is corrupt: {message}")]
    Corrupt { slot: String, message: String },
}

/// Byte store with whole-value replace semantics per key
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// One file per key under a directory.
///
/// Values are written to a temporary file and renamed into place, so a
/// reader sees either the previous or the new value.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store, mainly for tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.slots.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.slots.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.slots.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.slots.lock().remove(key);
        Ok(())
    }
}

/// Everything persisted for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub version: u32,
    #[serde(default)]
    pub weather: HashMap<String, WeatherSnapshot>,
    #[serde(default)]
    pub forecast: HashMap<String, Vec<ForecastSample>>,
    #[serde(default)]
    pub favorites: Vec<String>,
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default)]
    pub alerts: HashMap<String, WeatherAlert>,
    #[serde(default)]
    pub current_coordinates: Option<Coordinates>,
}

impl Default for DashboardSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            weather: HashMap::new(),
            forecast: HashMap::new(),
            favorites: Vec::new(),
            history: Vec::new(),
            alerts: HashMap::new(),
            current_coordinates: None,
        }
    }
}

/// Dashboard state of one user identity on top of a [`KeyValueStore`]
#[derive(Clone)]
pub struct DashboardStorage {
    backend: Arc<dyn KeyValueStore>,
    user_token: String,
}

impl std::fmt::Debug for DashboardStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardStorage")
            .field("user_token", &self.user_token)
            .finish_non_exhaustive()
    }
}

impl DashboardStorage {
    /// Open storage for the persisted user, generating a token on first run.
    pub fn open(backend: Arc<dyn KeyValueStore>) -> Result<Self, StorageError> {
        let existing = backend
            .get(USER_TOKEN_SLOT)?
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        let user_token = match existing {
            Some(token) => token,
            None => {
                let token = format!("user_{}", uuid::Uuid::new_v4().simple());
                backend.put(USER_TOKEN_SLOT, token.as_bytes())?;
                tracing::info!("Generated new user token");
                token
            }
        };

        Ok(Self {
            backend,
            user_token,
        })
    }

    pub fn user_token(&self) -> &str {
        &self.user_token
    }

    fn slot(&self, name: &str) -> String {
        format!("{}_{}", name, self.user_token)
    }

    /// Load the persisted dashboard.
    ///
    /// Returns `Ok(None)` when nothing usable is stored. A snapshot written by
    /// an unknown version is ignored. When only the legacy per-slot layout
    /// exists it is imported, written back as a snapshot and removed.
    pub fn load(&self) -> Result<Option<DashboardSnapshot>, StorageError> {
        let slot = self.slot(SNAPSHOT_SLOT_PREFIX);
        if let Some(bytes) = self.backend.get(&slot)? {
            let snapshot: DashboardSnapshot =
                serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt {
                    slot: slot.clone(),
                    message: e.to_string(),
                })?;

            if snapshot.version != SNAPSHOT_VERSION {
                tracing::warn!(
                    "Ignoring dashboard snapshot with unsupported version {}",
                    snapshot.version
                );
                return Ok(None);
            }
            return Ok(Some(snapshot));
        }

        match self.import_legacy()? {
            Some(snapshot) => {
                self.save(&snapshot)?;
                self.delete_legacy()?;
                tracing::info!(
                    "Imported legacy dashboard state ({} locations)",
                    snapshot.weather.len()
                );
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    /// Replace the persisted dashboard in a single write
    pub fn save(&self, snapshot: &DashboardSnapshot) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(snapshot)?;
        self.backend.put(&self.slot(SNAPSHOT_SLOT_PREFIX), &bytes)
    }

    fn read_legacy<T: serde::de::DeserializeOwned>(
        &self,
        name: &str,
    ) -> Result<Option<T>, StorageError> {
        let slot = self.slot(name);
        let Some(bytes) = self.backend.get(&slot)? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!("Skipping unreadable legacy slot {}: {}", slot, e);
                Ok(None)
            }
        }
    }

    fn import_legacy(&self) -> Result<Option<DashboardSnapshot>, StorageError> {
        // Legacy blobs hold raw provider responses; null marks a removed entry.
        let weather: Option<HashMap<String, Option<CurrentResponse>>> =
            self.read_legacy(LEGACY_WEATHER_SLOT)?;
        let forecast: Option<HashMap<String, Option<Vec<ForecastEntry>>>> =
            self.read_legacy(LEGACY_FORECAST_SLOT)?;
        let favorites: Option<Vec<String>> = self.read_legacy(LEGACY_FAVORITES_SLOT)?;
        let history: Option<Vec<String>> = self.read_legacy(LEGACY_HISTORY_SLOT)?;

        if weather.is_none() && forecast.is_none() && favorites.is_none() && history.is_none() {
            return Ok(None);
        }

        let now = Utc::now();
        let weather: HashMap<String, WeatherSnapshot> = weather
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(key, body)| Some((key, body?.into_snapshot(Units::Metric, now))))
            .collect();

        // Forecasts are only kept for keys that still have weather.
        let forecast: HashMap<String, Vec<ForecastSample>> = forecast
            .unwrap_or_default()
            .into_iter()
            .filter(|(key, _)| weather.contains_key(key))
            .filter_map(|(key, entries)| {
                Some((key, entries?.into_iter().map(ForecastSample::from).collect()))
            })
            .collect();

        Ok(Some(DashboardSnapshot {
            version: SNAPSHOT_VERSION,
            weather,
            forecast,
            favorites: favorites.unwrap_or_default(),
            history: history.unwrap_or_default(),
            // Alerts are recomputed from the imported weather.
            alerts: HashMap::new(),
            current_coordinates: None,
        }))
    }

    fn delete_legacy(&self) -> Result<(), StorageError> {
        for name in [
            LEGACY_WEATHER_SLOT,
            LEGACY_FORECAST_SLOT,
            LEGACY_FAVORITES_SLOT,
            LEGACY_HISTORY_SLOT,
            LEGACY_ALERTS_SLOT,
        ] {
            self.backend.delete(&self.slot(name))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_token_generated_once() {
        let backend = Arc::new(MemoryStore::new());
        let first = DashboardStorage::open(backend.clone()).unwrap();
        let second = DashboardStorage::open(backend.clone()).unwrap();

        assert!(first.user_token().starts_with("user_"));
        assert_eq!(first.user_token(), second.user_token());
    }

    #[test]
    fn test_existing_token_reused() {
        let backend = Arc::new(MemoryStore::new());
        backend.put("userToken", b"user_1700000000000").unwrap();
        let storage = DashboardStorage::open(backend).unwrap();
        assert_eq!(storage.user_token(), "user_1700000000000");
    }

    #[test]
    fn test_empty_store_loads_nothing() {
        let storage = DashboardStorage::open(Arc::new(MemoryStore::new())).unwrap();
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let backend = Arc::new(MemoryStore::new());
        let storage = DashboardStorage::open(backend.clone()).unwrap();

        let snapshot = DashboardSnapshot {
            favorites: vec!["Tokyo".into()],
            history: vec!["Paris".into(), "Tokyo".into()],
            ..Default::default()
        };
        storage.save(&snapshot).unwrap();

        let slot = format!("dashboard_{}", storage.user_token());
        assert!(backend.keys().contains(&slot));
        assert_eq!(storage.load().unwrap(), Some(snapshot));
    }

    #[test]
    fn test_users_are_namespaced() {
        let backend = Arc::new(MemoryStore::new());
        let storage = DashboardStorage::open(backend.clone()).unwrap();
        storage
            .save(&DashboardSnapshot {
                history: vec!["Oslo".into()],
                ..Default::default()
            })
            .unwrap();

        // A different identity on the same backend sees nothing.
        backend.put("userToken", b"user_other").unwrap();
        let other = DashboardStorage::open(backend).unwrap();
        assert!(other.load().unwrap().is_none());
    }

    #[test]
    fn test_unknown_version_ignored() {
        let backend = Arc::new(MemoryStore::new());
        let storage = DashboardStorage::open(backend.clone()).unwrap();
        let slot = format!("dashboard_{}", storage.user_token());
        backend
            .put(&slot, br#"{"version": 99, "history": ["Oslo"]}"#)
            .unwrap();

        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_snapshot_is_error() {
        let backend = Arc::new(MemoryStore::new());
        let storage = DashboardStorage::open(backend.clone()).unwrap();
        let slot = format!("dashboard_{}", storage.user_token());
        backend.put(&slot, b"{not json").unwrap();

        assert!(matches!(
            storage.load(),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_legacy_slots_imported_and_removed() {
        let backend = Arc::new(MemoryStore::new());
        backend.put("userToken", b"user_42").unwrap();
        backend
            .put(
                "weatherData_user_42",
                serde_json::json!({
                    "Paris": {
                        "name": "Paris",
                        "main": { "temp": 38.0, "feels_like": 39.0, "humidity": 20 },
                        "wind": { "speed": 3.0, "deg": 10 },
                        "sys": { "sunrise": 1_700_000_000, "sunset": 1_700_030_000 },
                        "weather": [{ "id": 800, "description": "clear sky", "icon": "01d" }]
                    },
                    "Gone": null
                })
                .to_string()
                .as_bytes(),
            )
            .unwrap();
        backend
            .put("searchedLocations_user_42", br#"["Paris"]"#)
            .unwrap();
        backend.put("favorites_user_42", b"not json").unwrap();
        backend
            .put("weatherAlerts_user_42", br#"{"Paris": "Extreme heat warning"}"#)
            .unwrap();

        let storage = DashboardStorage::open(backend.clone()).unwrap();
        let snapshot = storage.load().unwrap().unwrap();

        assert_eq!(snapshot.history, vec!["Paris".to_string()]);
        assert!(snapshot.favorites.is_empty());
        assert_eq!(snapshot.weather.len(), 1);
        assert_eq!(snapshot.weather["Paris"].temperature, 38.0);
        assert_eq!(backend.keys(), vec!["dashboard_user_42", "userToken"]);

        // Second load reads the migrated snapshot.
        assert_eq!(storage.load().unwrap(), Some(snapshot));
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state")).unwrap();

        assert!(store.get("dashboard_user_1").unwrap().is_none());
        store.put("dashboard_user_1", b"first").unwrap();
        store.put("dashboard_user_1", b"second").unwrap();
        assert_eq!(store.get("dashboard_user_1").unwrap().unwrap(), b"second");

        store.delete("dashboard_user_1").unwrap();
        store.delete("dashboard_user_1").unwrap();
        assert!(store.get("dashboard_user_1").unwrap().is_none());
    }

    #[test]
    fn test_file_store_sanitizes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        store.put("../escape/attempt", b"x").unwrap();

        assert!(dir.path().join("___escape_attempt.json").exists());
        assert_eq!(store.get("../escape/attempt").unwrap().unwrap(), b"x");
    }
}
