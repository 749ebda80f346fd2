use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Weather provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Reverse geocoding and autocomplete endpoints
    #[serde(default)]
    pub geocode: GeocodeConfig,

    /// Dashboard state settings
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Alert thresholds
    #[serde(default)]
    pub alerts: AlertsConfig,

    /// Fixed position used in place of system geolocation
    #[serde(default)]
    pub location: LocationConfig,
}

/// Unit system requested from the weather provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    Standard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the OpenWeatherMap-compatible API
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// API key. Falls back to OPENWEATHER_API_KEY when unset; the
    /// environment value is never written back to the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Unit system for temperatures and wind speed
    #[serde(default)]
    pub units: Units,
}

fn default_provider_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            api_key: None,
            units: Units::Metric,
        }
    }
}

impl ProviderConfig {
    /// Key to send with requests: the configured one, else the environment's
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_api_key(self.api_key.as_deref(), std::env::var(API_KEY_ENV).ok())
    }
}

fn resolve_api_key(configured: Option<&str>, env: Option<String>) -> Option<String> {
    configured
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .or_else(|| env.filter(|key| !key.trim().is_empty()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeConfig {
    /// Reverse geocoding endpoint (coordinates -> place name)
    #[serde(default = "default_reverse_url")]
    pub reverse_url: String,

    /// Place-name autocomplete endpoint
    #[serde(default = "default_suggest_url")]
    pub suggest_url: String,
}

fn default_reverse_url() -> String {
    "https://api.bigdatacloud.net/data/reverse-geocode-client".to_string()
}

fn default_suggest_url() -> String {
    "https://api.teleport.org/api/cities/".to_string()
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            reverse_url: default_reverse_url(),
            suggest_url: default_suggest_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Directory holding persisted dashboard state
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Number of searched locations remembered (default: 10)
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Maximum locations refreshed at the same time (default: 4)
    #[serde(default = "default_refresh_concurrency")]
    pub refresh_concurrency: usize,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("weatherboard")
}

fn default_history_limit() -> usize {
    10
}

fn default_refresh_concurrency() -> usize {
    4
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            history_limit: default_history_limit(),
            refresh_concurrency: default_refresh_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Temperatures above this raise an extreme heat alert
    #[serde(default = "default_heat_celsius")]
    pub heat_celsius: f64,

    /// Temperatures below this raise a cold alert
    #[serde(default = "default_cold_celsius")]
    pub cold_celsius: f64,

    /// Wind speeds above this (provider units) raise a high wind alert
    #[serde(default = "default_wind_speed")]
    pub wind_speed: f64,
}

fn default_heat_celsius() -> f64 {
    35.0
}

fn default_cold_celsius() -> f64 {
    10.0
}

fn default_wind_speed() -> f64 {
    20.0
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            heat_celsius: default_heat_celsius(),
            cold_celsius: default_cold_celsius(),
            wind_speed: default_wind_speed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl LocationConfig {
    /// Both coordinates, when configured
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, creating default if it doesn't exist
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        self.validate_with_key(self.provider.resolved_api_key().as_deref())
    }

    fn validate_with_key(&self, api_key: Option<&str>) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.provider.base_url, "provider.base_url", &mut result);
        self.validate_url(&self.geocode.reverse_url, "geocode.reverse_url", &mut result);
        self.validate_url(&self.geocode.suggest_url, "geocode.suggest_url", &mut result);

        if api_key.is_none() {
            result.add_warning(
                "provider.api_key",
                "No API key configured - weather requests will be rejected",
            );
        }

        if self.dashboard.history_limit == 0 {
            result.add_error(
                "dashboard.history_limit",
                "History limit must be greater than 0",
            );
        } else if self.dashboard.history_limit > 100 {
            result.add_warning(
                "dashboard.history_limit",
                "History limit is unusually large (>100)",
            );
        }

        if self.dashboard.refresh_concurrency == 0 {
            result.add_error(
                "dashboard.refresh_concurrency",
                "Refresh concurrency must be greater than 0",
            );
        }

        if self.alerts.cold_celsius >= self.alerts.heat_celsius {
            result.add_warning(
                "alerts",
                "Cold threshold is not below the heat threshold",
            );
        }

        match (self.location.latitude, self.location.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    result.add_error("location.latitude", "Latitude must be within -90..90");
                }
                if !(-180.0..=180.0).contains(&lon) {
                    result.add_error("location.longitude", "Longitude must be within -180..180");
                }
            }
            (None, None) => {}
            _ => result.add_warning(
                "location",
                "Only one coordinate set - fixed location ignored",
            ),
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if let Some(port) = url.port() {
                    if port == 0 {
                        result.add_error(field_name, "Port cannot be 0");
                    }
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Ensure config directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("weatherboard");

        Ok(config_dir.join("config.toml"))
    }
}
