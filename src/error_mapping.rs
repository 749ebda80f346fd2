//! Conversion of weather-crate errors into the application error hierarchy.

use weatherboard_core::error::ReqwestErrorExt;
use weatherboard_core::{AppError, LocationError, StorageError, WeatherError};
use weatherboard_weather::{
    LocationError as SourceLocationError, StorageError as SourceStorageError, StoreError,
    WeatherError as ProviderError,
};

/// Extension trait for converting store errors to [`AppError`].
pub trait IntoAppError {
    fn into_app_error(self) -> AppError;
}

impl IntoAppError for StoreError {
    fn into_app_error(self) -> AppError {
        match self {
            StoreError::EmptyLocation => AppError::Weather(WeatherError::EmptyLocation),
            StoreError::FetchFailed { key, source } => match source {
                ProviderError::Network(e) if e.status().is_none() => {
                    AppError::Network(e.into_network_error())
                }
                e if e.status().map(|s| s.as_u16()) == Some(401) => {
                    AppError::Weather(WeatherError::InvalidApiKey)
                }
                _ => AppError::Weather(WeatherError::FetchFailed(key)),
            },
            StoreError::InFlight(key) => AppError::Weather(WeatherError::Busy(key)),
            StoreError::Superseded(key) => AppError::Weather(WeatherError::Discarded(key)),
            StoreError::Location(e) => AppError::Location(e.into_app_location_error()),
            StoreError::Restore(e) => AppError::Storage(e.into_restore_error()),
            StoreError::Persist(e) => AppError::Storage(e.into_persist_error()),
        }
    }
}

trait IntoAppLocationError {
    fn into_app_location_error(self) -> LocationError;
}

impl IntoAppLocationError for SourceLocationError {
    fn into_app_location_error(self) -> LocationError {
        match self {
            SourceLocationError::PermissionDenied => LocationError::PermissionDenied,
            SourceLocationError::Unsupported => LocationError::Unsupported,
            other => LocationError::Failed(other.to_string()),
        }
    }
}

trait IntoAppStorageError {
    /// Failure while opening or loading the dashboard
    fn into_restore_error(self) -> StorageError;
    /// Failure while saving the dashboard
    fn into_persist_error(self) -> StorageError;
}

impl IntoAppStorageError for SourceStorageError {
    fn into_restore_error(self) -> StorageError {
        match self {
            SourceStorageError::Corrupt { slot, message } => {
                StorageError::Corruption(format!("{}: {}", slot, message))
            }
            other => StorageError::ReadFailed(other.to_string()),
        }
    }

    fn into_persist_error(self) -> StorageError {
        StorageError::WriteFailed(self.to_string())
    }
}
