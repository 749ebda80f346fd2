//! Which cards to show, in which order.

use crate::types::{ForecastSample, WeatherAlert, WeatherSnapshot};

/// Everything the detail view needs for one location
#[derive(Debug, Clone, PartialEq)]
pub struct LocationCard {
    pub key: String,
    pub weather: Option<WeatherSnapshot>,
    pub forecast: Vec<ForecastSample>,
    pub alert: Option<WeatherAlert>,
    pub is_favorite: bool,
}

/// Order card keys for display.
///
/// Candidates are `leading` (if any), then `history`, then `favorites`,
/// first occurrence wins. Keys not containing `filter` (case-insensitive)
/// are dropped, then favorites are moved ahead of the rest. Relative order
/// inside each group is kept.
pub fn order_locations(
    leading: Option<&str>,
    history: &[String],
    favorites: &[String],
    filter: &str,
) -> Vec<String> {
    let needle = filter.to_lowercase();

    let mut keys: Vec<String> = Vec::new();
    for key in leading
        .into_iter()
        .chain(history.iter().map(String::as_str))
        .chain(favorites.iter().map(String::as_str))
    {
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }

    keys.retain(|k| needle.is_empty() || k.to_lowercase().contains(&needle));
    // sort_by_key is stable
    keys.sort_by_key(|k| !favorites.contains(k));
    keys
}
