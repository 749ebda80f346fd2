//! Wires configuration to the weather store and runs the startup sequence:
//! restore, refresh, then geolocate.

use std::sync::Arc;

use anyhow::{Context, Result};
use weatherboard_core::{AlertsConfig, Config, Units as ConfigUnits};
use weatherboard_weather::{
    AlertThresholds, Coordinates, FileStore, FixedLocation, GeocodeClient, LocationWeatherStore,
    NoLocation, StoreError, StoreOptions, Units, WeatherProvider, CURRENT_LOCATION_KEY,
};

use crate::error_mapping::IntoAppError;

pub struct Dashboard {
    store: LocationWeatherStore,
    geocoder: GeocodeClient,
    position: Option<Coordinates>,
    place: Option<String>,
}

fn provider_units(units: ConfigUnits) -> Units {
    match units {
        ConfigUnits::Metric => Units::Metric,
        ConfigUnits::Imperial => Units::Imperial,
        ConfigUnits::Standard => Units::Standard,
    }
}

/// Row label: the geocoded place name stands in for the current-location key
fn card_label<'a>(key: &'a str, place: Option<&'a str>) -> &'a str {
    if key == CURRENT_LOCATION_KEY {
        place.unwrap_or("Current location")
    } else {
        key
    }
}

fn thresholds(alerts: &AlertsConfig) -> AlertThresholds {
    AlertThresholds {
        heat_celsius: alerts.heat_celsius,
        cold_celsius: alerts.cold_celsius,
        wind_speed: alerts.wind_speed,
    }
}

impl Dashboard {
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = WeatherProvider::new(
            config.provider.base_url.clone(),
            config.provider.resolved_api_key().unwrap_or_default(),
            provider_units(config.provider.units),
        )
        .context("Failed to create weather provider")?;

        let geocoder = GeocodeClient::new(
            config.geocode.reverse_url.clone(),
            config.geocode.suggest_url.clone(),
        )
        .context("Failed to create geocoding client")?;

        let backend = FileStore::new(&config.dashboard.data_dir)
            .context("Failed to open dashboard data directory")?;

        let options = StoreOptions {
            history_limit: config.dashboard.history_limit,
            refresh_concurrency: config.dashboard.refresh_concurrency,
            thresholds: thresholds(&config.alerts),
        };

        let store = LocationWeatherStore::open(provider, Arc::new(backend), options)
            .map_err(|e| anyhow::anyhow!(e.into_app_error()))
            .context("Failed to open dashboard state")?;

        let position = config
            .location
            .coordinates()
            .map(|(latitude, longitude)| Coordinates {
                latitude,
                longitude,
            });

        Ok(Self {
            store,
            geocoder,
            position,
            place: None,
        })
    }

    pub fn store(&self) -> &LocationWeatherStore {
        &self.store
    }

    /// Refresh everything that was restored, then add the current location.
    /// Failures are reported and never abort startup.
    pub async fn startup(&mut self) {
        let report = self.store.refresh_all().await;
        tracing::info!(
            "Refreshed {} locations ({} skipped, {} failed)",
            report.updated.len(),
            report.skipped.len(),
            report.errors.len()
        );
        for err in report.errors {
            Self::report(err);
        }

        let located = match self.position {
            Some(coords) => self
                .store
                .fetch_current_location(&FixedLocation(coords))
                .await
                .map(|_| Some(coords)),
            None => self
                .store
                .fetch_current_location(&NoLocation)
                .await
                .map(|_| None),
        };

        match located {
            Ok(Some(coords)) => {
                let place = self.geocoder.reverse_geocode(coords).await;
                tracing::info!("Current location: {}", place);
                self.place = Some(place);
            }
            Ok(None) => {}
            Err(err) => Self::report(err),
        }
    }

    fn report(err: StoreError) {
        let detail = err.to_string();
        let app_err = err.into_app_error();
        tracing::warn!("{} ({})", app_err.user_message(), detail);
    }

    /// Print the cards in display order
    pub fn print_summary(&self) {
        let keys = self.store.visible_locations("");
        if keys.is_empty() {
            println!("No locations yet. Add a city to the dashboard to get started.");
            return;
        }

        for key in keys {
            let Some(card) = self.store.card(&key) else {
                continue;
            };
            let star = if card.is_favorite { "*" } else { " " };
            let label = card_label(&key, self.place.as_deref());
            match &card.weather {
                Some(w) => println!(
                    "{} {:<24} {:>6.1}  {:<20} {}",
                    star,
                    label,
                    w.temperature,
                    w.description,
                    card.alert.map(|a| a.label()).unwrap_or("")
                ),
                None => println!("{} {:<24} (no data)", star, label),
            }
        }
    }
}
