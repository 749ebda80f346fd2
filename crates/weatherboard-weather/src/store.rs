//! In-memory dashboard state mirrored to [`DashboardStorage`].
//!
//! Every successful mutation (fetch, remove, favorite toggle) is followed by
//! a single snapshot write. Fetches for the same key are never run twice at
//! once, and a fetch that finishes after its key was removed is dropped.
//!
//! A key is pending from the moment a fetch or refresh claims it until that
//! fetch ends, including time spent waiting for a refresh permit. Removing a
//! pending key bumps its generation; the claim remembers the generation it
//! started with and its result is discarded on mismatch.

use crate::alert::AlertThresholds;
use crate::location::LocationSource;
use crate::provider::WeatherProvider;
use crate::storage::{DashboardSnapshot, DashboardStorage, KeyValueStore, StorageError};
use crate::types::{
    Coordinates, ForecastSample, LocationError, LocationQuery, LocationWeather, WeatherAlert,
    WeatherError, WeatherSnapshot, CURRENT_LOCATION_KEY,
};
use crate::view::{order_locations, LocationCard};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Location name is empty")]
    EmptyLocation,
    #[error("Failed to fetch weather data for {key}: {source}")]
    FetchFailed {
        key: String,
        #[source]
        source: WeatherError,
    },
    #[error("A fetch for {0} is already in progress")]
    InFlight(String),
    #[error("{0} was removed while its fetch was in progress")]
    Superseded(String),
    #[error("Location unavailable: {0}")]
    Location(#[from] LocationError),
    #[error("Failed to load dashboard: {0}")]
    Restore(#[source] StorageError),
    #[error("Failed to save dashboard: {0}")]
    Persist(#[source] StorageError),
}

impl StoreError {
    /// The location this error is about, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::FetchFailed { key, .. } => Some(key.as_str()),
            Self::InFlight(key) | Self::Superseded(key) => Some(key.as_str()),
            Self::EmptyLocation | Self::Location(_) | Self::Restore(_) | Self::Persist(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub history_limit: usize,
    pub refresh_concurrency: usize,
    pub thresholds: AlertThresholds,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            history_limit: 10,
            refresh_concurrency: 4,
            thresholds: AlertThresholds::default(),
        }
    }
}

/// Outcome of [`LocationWeatherStore::refresh_all`]
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub updated: Vec<String>,
    /// Already in flight, or removed before the result arrived
    pub skipped: Vec<String>,
    pub errors: Vec<StoreError>,
}

impl RefreshReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Default)]
struct StoreState {
    weather: HashMap<String, WeatherSnapshot>,
    forecast: HashMap<String, Vec<ForecastSample>>,
    alerts: HashMap<String, WeatherAlert>,
    favorites: Vec<String>,
    history: Vec<String>,
    current_coordinates: Option<Coordinates>,
    pending: HashSet<String>,
    // Only pending keys that were removed have an entry
    generations: HashMap<String, u64>,
}

impl StoreState {
    fn from_snapshot(snapshot: DashboardSnapshot, thresholds: &AlertThresholds) -> Self {
        let mut state = Self {
            weather: snapshot.weather,
            forecast: snapshot.forecast,
            favorites: snapshot.favorites,
            history: snapshot.history,
            current_coordinates: snapshot.current_coordinates,
            ..Default::default()
        };
        // Forecasts never outlive their snapshot.
        let weather = &state.weather;
        state.forecast.retain(|key, _| weather.contains_key(key));
        state.alerts = state
            .weather
            .iter()
            .filter_map(|(key, snapshot)| Some((key.clone(), thresholds.evaluate(snapshot)?)))
            .collect();
        state
    }

    fn to_snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            weather: self.weather.clone(),
            forecast: self.forecast.clone(),
            favorites: self.favorites.clone(),
            history: self.history.clone(),
            alerts: self.alerts.clone(),
            current_coordinates: self.current_coordinates,
            ..Default::default()
        }
    }

    fn generation(&self, key: &str) -> u64 {
        self.generations.get(key).copied().unwrap_or(0)
    }

    fn record_search(&mut self, key: &str, limit: usize) {
        self.history.retain(|k| k != key);
        self.history.insert(0, key.to_string());
        self.history.truncate(limit);
    }

    fn remove(&mut self, key: &str) -> bool {
        if self.pending.contains(key) {
            *self.generations.entry(key.to_string()).or_insert(0) += 1;
        }

        let mut changed = self.weather.remove(key).is_some();
        changed |= self.forecast.remove(key).is_some();
        changed |= self.alerts.remove(key).is_some();

        let before = self.history.len() + self.favorites.len();
        self.history.retain(|k| k != key);
        self.favorites.retain(|k| k != key);
        changed |= before != self.history.len() + self.favorites.len();

        if key == CURRENT_LOCATION_KEY && self.current_coordinates.take().is_some() {
            changed = true;
        }
        changed
    }

    fn refresh_targets(&self) -> Vec<(String, LocationQuery)> {
        let mut targets: Vec<(String, LocationQuery)> = Vec::new();

        if let Some(coords) = self.current_coordinates {
            if self.weather.contains_key(CURRENT_LOCATION_KEY) {
                targets.push((
                    CURRENT_LOCATION_KEY.to_string(),
                    LocationQuery::Coordinates(coords),
                ));
            }
        }
        for key in self.history.iter().chain(self.favorites.iter()) {
            if key != CURRENT_LOCATION_KEY && !targets.iter().any(|(k, _)| k == key) {
                targets.push((key.clone(), LocationQuery::Name(key.clone())));
            }
        }
        targets
    }
}

/// Claim on a pending key. Releases the key when the fetch ends, however it
/// ends. Must not be dropped while the state lock is held.
struct PendingGuard<'a> {
    state: &'a Mutex<StoreState>,
    key: String,
    generation: u64,
}

impl<'a> PendingGuard<'a> {
    fn claim(state: &mut StoreState, lock: &'a Mutex<StoreState>, key: &str) -> Option<Self> {
        if !state.pending.insert(key.to_string()) {
            return None;
        }
        Some(PendingGuard {
            state: lock,
            key: key.to_string(),
            generation: state.generation(key),
        })
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.pending.remove(&self.key);
        state.generations.remove(&self.key);
    }
}

pub struct LocationWeatherStore {
    provider: WeatherProvider,
    storage: DashboardStorage,
    options: StoreOptions,
    state: Mutex<StoreState>,
}

impl LocationWeatherStore {
    /// Open the store for the persisted user and restore their dashboard.
    ///
    /// A corrupt snapshot is logged and replaced by an empty dashboard.
    pub fn open(
        provider: WeatherProvider,
        backend: Arc<dyn KeyValueStore>,
        options: StoreOptions,
    ) -> Result<Self, StoreError> {
        let storage = DashboardStorage::open(backend).map_err(StoreError::Restore)?;

        let snapshot = match storage.load() {
            Ok(snapshot) => snapshot.unwrap_or_default(),
            Err(StorageError::Corrupt { slot, message }) => {
                tracing::warn!("Discarding corrupt dashboard state in {}: {}", slot, message);
                DashboardSnapshot::default()
            }
            Err(e) => return Err(StoreError::Restore(e)),
        };

        let state = StoreState::from_snapshot(snapshot, &options.thresholds);
        tracing::info!(
            "Restored dashboard: {} locations, {} favorites",
            state.weather.len(),
            state.favorites.len()
        );

        Ok(Self {
            provider,
            storage,
            options,
            state: Mutex::new(state),
        })
    }

    pub fn user_token(&self) -> &str {
        self.storage.user_token()
    }

    /// Fetch weather for a searched place name and record the search.
    pub async fn fetch(&self, location: &str) -> Result<LocationWeather, StoreError> {
        let key = location.trim();
        if key.is_empty() {
            return Err(StoreError::EmptyLocation);
        }
        self.fetch_key(key.to_string(), LocationQuery::Name(key.to_string()), true)
            .await
    }

    /// Fetch weather for a position and store it under the current-location key.
    /// Never touches the search history.
    pub async fn fetch_coordinates(
        &self,
        coords: Coordinates,
    ) -> Result<LocationWeather, StoreError> {
        self.fetch_key(
            CURRENT_LOCATION_KEY.to_string(),
            LocationQuery::Coordinates(coords),
            false,
        )
        .await
    }

    /// Ask `source` for the device position and fetch weather there.
    pub async fn fetch_current_location<L: LocationSource>(
        &self,
        source: &L,
    ) -> Result<LocationWeather, StoreError> {
        let coords = source.current_position().await?;
        tracing::info!("Got location: {}, {}", coords.latitude, coords.longitude);
        self.fetch_coordinates(coords).await
    }

    async fn fetch_key(
        &self,
        key: String,
        query: LocationQuery,
        record_search: bool,
    ) -> Result<LocationWeather, StoreError> {
        let guard = self.begin_fetch(&key)?;
        self.run_fetch(guard, query, record_search).await
    }

    fn begin_fetch(&self, key: &str) -> Result<PendingGuard<'_>, StoreError> {
        let mut state = self.state.lock();
        PendingGuard::claim(&mut state, &self.state, key).ok_or_else(|| {
            tracing::debug!("Fetch for {} already in flight", key);
            StoreError::InFlight(key.to_string())
        })
    }

    fn is_superseded(&self, guard: &PendingGuard<'_>) -> bool {
        self.state.lock().generation(&guard.key) != guard.generation
    }

    async fn run_fetch(
        &self,
        guard: PendingGuard<'_>,
        query: LocationQuery,
        record_search: bool,
    ) -> Result<LocationWeather, StoreError> {
        let key = guard.key.clone();
        let generation = guard.generation;

        // Removed while waiting for a refresh permit
        if self.is_superseded(&guard) {
            tracing::info!("Skipping fetch for {}: removed before it started", key);
            return Err(StoreError::Superseded(key));
        }

        let weather = match self.provider.fetch(&query).await {
            Ok(weather) => weather,
            Err(source) => {
                tracing::warn!("Failed to fetch weather for {}: {}", key, source);
                return Err(StoreError::FetchFailed { key, source });
            }
        };

        let alert = self.options.thresholds.evaluate(&weather.snapshot);

        let mut state = self.state.lock();
        if state.generation(&key) != generation {
            tracing::info!("Dropping weather for {}: removed during fetch", key);
            return Err(StoreError::Superseded(key));
        }

        state.weather.insert(key.clone(), weather.snapshot.clone());
        state.forecast.insert(key.clone(), weather.forecast.clone());
        match alert {
            Some(alert) => {
                tracing::info!("Weather alert for {}: {}", key, alert);
                state.alerts.insert(key.clone(), alert);
            }
            None => {
                state.alerts.remove(&key);
            }
        }
        if let LocationQuery::Coordinates(coords) = query {
            state.current_coordinates = Some(coords);
        }
        if record_search {
            state.record_search(&key, self.options.history_limit);
        }

        self.persist(&state)?;
        tracing::debug!("Stored weather for {}", key);
        Ok(weather)
    }

    /// Refetch every searched, favorited and geolocated location.
    ///
    /// At most `refresh_concurrency` locations are fetched at once. One
    /// location failing does not affect the others.
    pub async fn refresh_all(&self) -> RefreshReport {
        let (claims, skipped) = self.claim_refresh_targets();
        tracing::info!(
            "Refreshing {} locations ({} already in flight)",
            claims.len(),
            skipped.len()
        );

        let permits = Semaphore::new(self.options.refresh_concurrency.max(1));
        let tasks = claims.into_iter().map(|(guard, query)| {
            let permits = &permits;
            async move {
                let _permit = permits.acquire().await.ok();
                let key = guard.key.clone();
                let result = self.run_fetch(guard, query, false).await;
                (key, result)
            }
        });

        let mut report = RefreshReport {
            skipped,
            ..RefreshReport::default()
        };
        for (key, result) in futures::future::join_all(tasks).await {
            match result {
                Ok(_) => report.updated.push(key),
                Err(StoreError::InFlight(_)) | Err(StoreError::Superseded(_)) => {
                    report.skipped.push(key)
                }
                Err(e) => report.errors.push(e),
            }
        }

        if !report.is_success() {
            tracing::warn!(
                "Refresh finished with {} failures ({} updated)",
                report.errors.len(),
                report.updated.len()
            );
        }
        report
    }

    /// Claim every refresh target under one lock, so a removal either
    /// happens before a key is listed or is seen by its claim. Keys already
    /// in flight are returned separately.
    fn claim_refresh_targets(&self) -> (Vec<(PendingGuard<'_>, LocationQuery)>, Vec<String>) {
        let mut state = self.state.lock();
        let targets = state.refresh_targets();

        let mut claims = Vec::with_capacity(targets.len());
        let mut skipped = Vec::new();
        for (key, query) in targets {
            match PendingGuard::claim(&mut state, &self.state, &key) {
                Some(guard) => claims.push((guard, query)),
                None => skipped.push(key),
            }
        }
        drop(state);
        (claims, skipped)
    }

    /// Forget a location everywhere. Removing an unknown key is a no-op.
    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.remove(key) {
            tracing::info!("Removed {}", key);
            self.persist(&state)?;
        }
        Ok(())
    }

    /// Flip favorite membership; returns whether `key` is now a favorite.
    pub fn toggle_favorite(&self, key: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        let now_favorite = if state.favorites.iter().any(|k| k == key) {
            state.favorites.retain(|k| k != key);
            false
        } else {
            state.favorites.push(key.to_string());
            true
        };
        self.persist(&state)?;
        Ok(now_favorite)
    }

    // Written under the state lock so the stored blob always matches the
    // latest mutation.
    fn persist(&self, state: &StoreState) -> Result<(), StoreError> {
        self.storage.save(&state.to_snapshot()).map_err(|e| {
            tracing::warn!("Failed to persist dashboard: {}", e);
            StoreError::Persist(e)
        })
    }

    pub fn weather(&self, key: &str) -> Option<WeatherSnapshot> {
        self.state.lock().weather.get(key).cloned()
    }

    pub fn forecast(&self, key: &str) -> Option<Vec<ForecastSample>> {
        self.state.lock().forecast.get(key).cloned()
    }

    pub fn alert(&self, key: &str) -> Option<WeatherAlert> {
        self.state.lock().alerts.get(key).copied()
    }

    /// Most recent search first
    pub fn history(&self) -> Vec<String> {
        self.state.lock().history.clone()
    }

    pub fn favorites(&self) -> Vec<String> {
        self.state.lock().favorites.clone()
    }

    pub fn is_favorite(&self, key: &str) -> bool {
        self.state.lock().favorites.iter().any(|k| k == key)
    }

    /// Whether a fetch or refresh currently holds `key`
    pub fn is_pending(&self, key: &str) -> bool {
        self.state.lock().pending.contains(key)
    }

    /// Keys of the cards to show for the current search text
    pub fn visible_locations(&self, filter: &str) -> Vec<String> {
        let state = self.state.lock();
        let leading = state
            .weather
            .contains_key(CURRENT_LOCATION_KEY)
            .then_some(CURRENT_LOCATION_KEY);
        order_locations(leading, &state.history, &state.favorites, filter)
    }

    /// Active alerts in display order
    pub fn alerts(&self) -> Vec<(String, WeatherAlert)> {
        let keys = self.visible_locations("");
        let state = self.state.lock();
        keys.into_iter()
            .filter_map(|key| {
                let alert = state.alerts.get(&key).copied()?;
                Some((key, alert))
            })
            .collect()
    }

    pub fn card(&self, key: &str) -> Option<LocationCard> {
        let state = self.state.lock();
        let is_favorite = state.favorites.iter().any(|k| k == key);
        let weather = state.weather.get(key).cloned();
        if weather.is_none() && !is_favorite && !state.history.iter().any(|k| k == key) {
            return None;
        }
        Some(LocationCard {
            key: key.to_string(),
            forecast: state.forecast.get(key).cloned().unwrap_or_default(),
            alert: state.alerts.get(key).copied(),
            weather,
            is_favorite,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::{Units, WeatherCondition};
    use chrono::Utc;

    fn snapshot(temperature: f64, wind_speed: f64) -> WeatherSnapshot {
        WeatherSnapshot {
            place_name: "Test".into(),
            country: None,
            temperature,
            feels_like: temperature,
            humidity: 50,
            pressure: 1013,
            wind_speed,
            wind_deg: 0,
            sunrise: Utc::now(),
            sunset: Utc::now(),
            condition: WeatherCondition::Clear,
            description: "clear sky".into(),
            icon: "01d".into(),
            rain_1h: None,
            units: Units::Metric,
            fetched_at: Utc::now(),
        }
    }

    fn offline_store(backend: Arc<MemoryStore>) -> LocationWeatherStore {
        let provider = WeatherProvider::new("http://127.0.0.1:9", "key", Units::Metric).unwrap();
        LocationWeatherStore::open(provider, backend, StoreOptions::default()).unwrap()
    }

    #[test]
    fn test_record_search_moves_to_front_and_truncates() {
        let mut state = StoreState::default();
        for i in 0..12 {
            state.record_search(&format!("City{}", i), 10);
        }
        state.record_search("City5", 10);

        assert_eq!(state.history.len(), 10);
        assert_eq!(state.history[0], "City5");
        assert_eq!(state.history.iter().filter(|k| *k == "City5").count(), 1);
        assert!(!state.history.contains(&"City0".to_string()));
    }

    #[test]
    fn test_remove_tracks_generation_only_while_pending() {
        let lock = Mutex::new(StoreState::default());

        let mut state = lock.lock();
        assert!(!state.remove("Nowhere"));
        assert!(state.generations.is_empty());

        let guard = PendingGuard::claim(&mut state, &lock, "Lisbon").unwrap();
        assert!(PendingGuard::claim(&mut state, &lock, "Lisbon").is_none());
        state.remove("Lisbon");
        assert_eq!(state.generation("Lisbon"), guard.generation + 1);
        drop(state);

        drop(guard);
        let state = lock.lock();
        assert!(state.pending.is_empty());
        assert!(state.generations.is_empty());
    }

    #[test]
    fn test_from_snapshot_recomputes_alerts_and_drops_orphan_forecasts() {
        let mut persisted = DashboardSnapshot::default();
        persisted.weather.insert("Cairo".into(), snapshot(40.0, 2.0));
        persisted.weather.insert("Lima".into(), snapshot(20.0, 2.0));
        persisted.forecast.insert("Ghost".into(), Vec::new());
        persisted.alerts.insert("Lima".into(), WeatherAlert::Cold);

        let state = StoreState::from_snapshot(persisted, &AlertThresholds::default());
        assert_eq!(state.alerts.get("Cairo"), Some(&WeatherAlert::ExtremeHeat));
        assert!(!state.alerts.contains_key("Lima"));
        assert!(!state.forecast.contains_key("Ghost"));
    }

    #[test]
    fn test_toggle_favorite_is_involution() {
        let store = offline_store(Arc::new(MemoryStore::new()));
        let before = store.favorites();

        assert!(store.toggle_favorite("Tokyo").unwrap());
        assert!(store.is_favorite("Tokyo"));
        assert!(!store.toggle_favorite("Tokyo").unwrap());
        assert_eq!(store.favorites(), before);
    }

    #[test]
    fn test_remove_unknown_key_is_noop() {
        let store = offline_store(Arc::new(MemoryStore::new()));
        store.remove("Atlantis").unwrap();
        assert!(store.weather("Atlantis").is_none());
        assert!(store.forecast("Atlantis").is_none());
        assert!(store.alert("Atlantis").is_none());
        assert!(!store.history().contains(&"Atlantis".to_string()));
        assert!(!store.is_favorite("Atlantis"));
    }

    #[test]
    fn test_favorites_persist_across_open() {
        let backend = Arc::new(MemoryStore::new());
        {
            let store = offline_store(backend.clone());
            store.toggle_favorite("Oslo").unwrap();
        }
        let reopened = offline_store(backend);
        assert_eq!(reopened.favorites(), vec!["Oslo".to_string()]);
    }

    #[test]
    fn test_corrupt_state_starts_empty() {
        let backend = Arc::new(MemoryStore::new());
        backend.put("userToken", b"user_7").unwrap();
        backend.put("dashboard_user_7", b"][").unwrap();

        let store = offline_store(backend);
        assert_eq!(store.user_token(), "user_7");
        assert!(store.history().is_empty());
    }

    #[test]
    fn test_visible_locations_include_favorite_without_data() {
        let store = offline_store(Arc::new(MemoryStore::new()));
        store.toggle_favorite("Reykjavik").unwrap();
        assert_eq!(store.visible_locations(""), vec!["Reykjavik".to_string()]);

        let card = store.card("Reykjavik").unwrap();
        assert!(card.is_favorite);
        assert!(card.weather.is_none());
        assert!(store.card("Unknown").is_none());
    }

    #[tokio::test]
    async fn test_empty_location_rejected() {
        let store = offline_store(Arc::new(MemoryStore::new()));
        assert!(matches!(
            store.fetch("   ").await,
            Err(StoreError::EmptyLocation)
        ));
    }

    #[tokio::test]
    async fn test_unsupported_geolocation() {
        let store = offline_store(Arc::new(MemoryStore::new()));
        let err = store
            .fetch_current_location(&crate::location::NoLocation)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Location(LocationError::Unsupported)));
    }
}
