//! Weather dashboard state for Weatherboard
//!
//! Fetches current conditions and a 5-day forecast from an
//! OpenWeatherMap-compatible API, derives threshold alerts, and keeps the
//! dashboard (searches, favorites, cached weather) in a per-user store.

pub mod alert;
pub mod forecast;
pub mod geocode;
pub mod location;
pub mod provider;
pub mod storage;
pub mod store;
pub mod types;
pub mod view;

pub use alert::AlertThresholds;
pub use geocode::{GeocodeClient, UNKNOWN_LOCATION};
pub use location::{FixedLocation, LocationSource, NoLocation};
pub use provider::WeatherProvider;
pub use storage::{
    DashboardSnapshot, DashboardStorage, FileStore, KeyValueStore, MemoryStore, StorageError,
};
pub use store::{LocationWeatherStore, RefreshReport, StoreError, StoreOptions};
pub use types::*;
pub use view::{order_locations, LocationCard};

pub use reqwest::StatusCode;
