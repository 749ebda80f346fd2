use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key under which geolocated weather is stored.
pub const CURRENT_LOCATION_KEY: &str = "currentLocation";

/// Unit system requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    Standard,
}

impl Units {
    /// Value of the provider's `units` query parameter
    pub fn as_param(&self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
            Self::Standard => "standard",
        }
    }

    /// Convert a temperature reported in these units to Celsius
    pub fn to_celsius(&self, value: f64) -> f64 {
        match self {
            Self::Metric => value,
            Self::Imperial => (value - 32.0) * 5.0 / 9.0,
            Self::Standard => value - 273.15,
        }
    }
}

/// Weather condition groups mapped from OpenWeatherMap condition ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    Clouds,
    Atmosphere,
    Drizzle,
    Rain,
    Snow,
    Thunderstorm,
}

impl WeatherCondition {
    /// Convert an OpenWeatherMap condition id to a WeatherCondition
    /// See: https://openweathermap.org/weather-conditions
    pub fn from_owm_id(id: i32) -> Self {
        match id {
            200..=299 => Self::Thunderstorm,
            300..=399 => Self::Drizzle,
            500..=599 => Self::Rain,
            600..=699 => Self::Snow,
            700..=799 => Self::Atmosphere,
            801..=899 => Self::Clouds,
            _ => Self::Clear, // 800 and unknown ids
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::Clouds => "Clouds",
            Self::Atmosphere => "Mist",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::Snow => "Snow",
            Self::Thunderstorm => "Thunderstorm",
        }
    }
}

/// Geographic position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// What to ask the provider for
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    /// Free-form place name ("Paris", "Paris, FR")
    Name(String),
    /// Position from geolocation
    Coordinates(Coordinates),
}

/// Current conditions for one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Place name as reported by the provider
    pub place_name: String,
    pub country: Option<String>,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub pressure: u32,
    pub wind_speed: f64,
    pub wind_deg: u16,
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
    pub condition: WeatherCondition,
    pub description: String,
    pub icon: String,
    /// Rain volume for the last hour, mm
    pub rain_1h: Option<f64>,
    pub units: Units,
    pub fetched_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    pub fn temperature_celsius(&self) -> f64 {
        self.units.to_celsius(self.temperature)
    }
}

/// One sample of the daily forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    pub time: DateTime<Utc>,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub condition: WeatherCondition,
    pub description: String,
    pub icon: String,
    pub wind_speed: f64,
    pub wind_deg: u16,
}

/// Result of a successful fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationWeather {
    pub snapshot: WeatherSnapshot,
    pub forecast: Vec<ForecastSample>,
}

/// Single active threshold warning for a location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherAlert {
    ExtremeHeat,
    Cold,
    HighWind,
}

impl WeatherAlert {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ExtremeHeat => "Extreme heat",
            Self::Cold => "Cold alert",
            Self::HighWind => "High wind",
        }
    }
}

impl std::fmt::Display for WeatherAlert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Geolocation errors
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Geolocation is not supported")]
    Unsupported,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Provider returned {status} for {endpoint}")]
    Status {
        status: reqwest::StatusCode,
        endpoint: &'static str,
    },
    #[error("Parse error: {0}")]
    Parse(String),
}

impl WeatherError {
    /// HTTP status from the provider, if the request got that far
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Network(e) => e.status(),
            Self::Parse(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owm_id_thunderstorm() {
        assert_eq!(WeatherCondition::from_owm_id(200), WeatherCondition::Thunderstorm);
        assert_eq!(WeatherCondition::from_owm_id(232), WeatherCondition::Thunderstorm);
    }

    #[test]
    fn test_owm_id_drizzle_and_rain() {
        assert_eq!(WeatherCondition::from_owm_id(301), WeatherCondition::Drizzle);
        assert_eq!(WeatherCondition::from_owm_id(500), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_owm_id(531), WeatherCondition::Rain);
    }

    #[test]
    fn test_owm_id_snow_and_atmosphere() {
        assert_eq!(WeatherCondition::from_owm_id(601), WeatherCondition::Snow);
        assert_eq!(WeatherCondition::from_owm_id(741), WeatherCondition::Atmosphere);
    }

    #[test]
    fn test_owm_id_clear_and_clouds() {
        assert_eq!(WeatherCondition::from_owm_id(800), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_owm_id(801), WeatherCondition::Clouds);
        assert_eq!(WeatherCondition::from_owm_id(804), WeatherCondition::Clouds);
    }

    #[test]
    fn test_owm_id_unknown_defaults_to_clear() {
        assert_eq!(WeatherCondition::from_owm_id(999), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_owm_id(-1), WeatherCondition::Clear);
    }

    #[test]
    fn test_units_to_celsius() {
        assert_eq!(Units::Metric.to_celsius(21.5), 21.5);
        assert!((Units::Imperial.to_celsius(95.0) - 35.0).abs() < 1e-9);
        assert!((Units::Standard.to_celsius(273.15)).abs() < 1e-9);
    }

    #[test]
    fn test_units_param() {
        assert_eq!(Units::Metric.as_param(), "metric");
        assert_eq!(Units::Imperial.as_param(), "imperial");
    }

    #[test]
    fn test_alert_labels() {
        assert_eq!(WeatherAlert::ExtremeHeat.to_string(), "Extreme heat");
        assert_eq!(WeatherAlert::Cold.to_string(), "Cold alert");
        assert_eq!(WeatherAlert::HighWind.to_string(), "High wind");
    }
}
