use crate::types::{WeatherAlert, WeatherSnapshot};
use serde::{Deserialize, Serialize};

/// Thresholds for the alert rule. Temperatures in Celsius, wind in provider units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub heat_celsius: f64,
    pub cold_celsius: f64,
    pub wind_speed: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            heat_celsius: 35.0,
            cold_celsius: 10.0,
            wind_speed: 20.0,
        }
    }
}

impl AlertThresholds {
    /// Alert for a snapshot, converting its temperature to Celsius first
    pub fn evaluate(&self, snapshot: &WeatherSnapshot) -> Option<WeatherAlert> {
        self.classify(snapshot.temperature_celsius(), snapshot.wind_speed)
    }

    /// At most one alert; heat beats cold beats wind.
    pub fn classify(&self, temperature_celsius: f64, wind_speed: f64) -> Option<WeatherAlert> {
        if temperature_celsius > self.heat_celsius {
            Some(WeatherAlert::ExtremeHeat)
        } else if temperature_celsius < self.cold_celsius {
            Some(WeatherAlert::Cold)
        } else if wind_speed > self.wind_speed {
            Some(WeatherAlert::HighWind)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Units, WeatherCondition};
    use chrono::Utc;

    fn rule() -> AlertThresholds {
        AlertThresholds::default()
    }

    #[test]
    fn test_heat_wins_over_wind() {
        assert_eq!(rule().classify(36.0, 25.0), Some(WeatherAlert::ExtremeHeat));
    }

    #[test]
    fn test_cold() {
        assert_eq!(rule().classify(5.0, 0.0), Some(WeatherAlert::Cold));
    }

    #[test]
    fn test_cold_wins_over_wind() {
        assert_eq!(rule().classify(-3.0, 30.0), Some(WeatherAlert::Cold));
    }

    #[test]
    fn test_high_wind() {
        assert_eq!(rule().classify(20.0, 25.0), Some(WeatherAlert::HighWind));
    }

    #[test]
    fn test_no_alert() {
        assert_eq!(rule().classify(20.0, 5.0), None);
    }

    #[test]
    fn test_boundaries_are_strict() {
        assert_eq!(rule().classify(35.0, 20.0), None);
        assert_eq!(rule().classify(10.0, 20.0), None);
    }

    #[test]
    fn test_imperial_snapshot_converted() {
        let snapshot = WeatherSnapshot {
            place_name: "Phoenix".into(),
            country: Some("US".into()),
            temperature: 104.0,
            feels_like: 101.0,
            humidity: 10,
            pressure: 1008,
            wind_speed: 5.0,
            wind_deg: 180,
            sunrise: Utc::now(),
            sunset: Utc::now(),
            condition: WeatherCondition::Clear,
            description: "clear sky".into(),
            icon: "01d".into(),
            rain_1h: None,
            units: Units::Imperial,
            fetched_at: Utc::now(),
        };
        assert_eq!(rule().evaluate(&snapshot), Some(WeatherAlert::ExtremeHeat));
    }
}
