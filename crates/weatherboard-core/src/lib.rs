pub mod config;
pub mod error;

pub use config::{
    AlertsConfig, Config, DashboardConfig, GeocodeConfig, LocationConfig, ProviderConfig, Units,
    ValidationResult,
};
pub use error::{AppError, LocationError, NetworkError, StorageError, WeatherError};

use anyhow::Result;

/// Initialize the core application
pub fn init() -> Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Weatherboard core initialized");
    Ok(())
}
