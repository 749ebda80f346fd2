//! Reverse geocoding (coordinates -> place name) and place-name autocomplete.
//! Both only feed the search box; failures degrade instead of erroring.

use crate::types::Coordinates;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Returned when the place name cannot be resolved
pub const UNKNOWN_LOCATION: &str = "Unknown location";

const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = "Weatherboard/0.1.0";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReverseGeocodeResponse {
    city: Option<String>,
    locality: Option<String>,
    principal_subdivision: Option<String>,
}

impl ReverseGeocodeResponse {
    /// city > locality > principal subdivision, skipping blanks
    fn place_name(self) -> Option<String> {
        [self.city, self.locality, self.principal_subdivision]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct SuggestResponse {
    #[serde(rename = "_embedded")]
    embedded: SuggestEmbedded,
}

#[derive(Debug, Deserialize)]
struct SuggestEmbedded {
    #[serde(rename = "city:search-results", default)]
    results: Vec<SuggestResult>,
}

#[derive(Debug, Deserialize)]
struct SuggestResult {
    matching_full_name: String,
}

#[derive(Debug, Clone)]
pub struct GeocodeClient {
    client: Arc<Client>,
    reverse_url: String,
    suggest_url: String,
}

impl GeocodeClient {
    pub fn new(
        reverse_url: impl Into<String>,
        suggest_url: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            reverse_url: reverse_url.into(),
            suggest_url: suggest_url.into(),
        })
    }

    /// Reverse geocode coordinates to a place name (e.g. "Lyon").
    /// Falls back to [`UNKNOWN_LOCATION`] on any failure.
    pub async fn reverse_geocode(&self, coords: Coordinates) -> String {
        match self.try_reverse_geocode(coords).await {
            Some(name) => {
                tracing::info!("Reverse geocoded to: {}", name);
                name
            }
            None => UNKNOWN_LOCATION.to_string(),
        }
    }

    async fn try_reverse_geocode(&self, coords: Coordinates) -> Option<String> {
        let response = match self
            .client
            .get(&self.reverse_url)
            .query(&[
                ("latitude", coords.latitude.to_string()),
                ("longitude", coords.longitude.to_string()),
                ("localityLanguage", "en".to_string()),
            ])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Reverse geocode request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!("Reverse geocode returned status {}", response.status());
            return None;
        }

        match response.json::<ReverseGeocodeResponse>().await {
            Ok(body) => body.place_name(),
            Err(e) => {
                tracing::warn!("Reverse geocode parse error: {}", e);
                None
            }
        }
    }

    /// Candidate full place names for a partial query.
    /// Blank queries and failures yield no suggestions.
    pub async fn suggest(&self, query: &str) -> Vec<String> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let response = match self
            .client
            .get(&self.suggest_url)
            .query(&[("search", query)])
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::debug!("Suggestions returned status {}", r.status());
                return Vec::new();
            }
            Err(e) => {
                tracing::debug!("Suggestion request failed: {}", e);
                return Vec::new();
            }
        };

        match response.json::<SuggestResponse>().await {
            Ok(body) => body
                .embedded
                .results
                .into_iter()
                .map(|r| r.matching_full_name)
                .collect(),
            Err(e) => {
                tracing::debug!("Suggestion parse error: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn parse(json: serde_json::Value) -> Option<String> {
        serde_json::from_value::<ReverseGeocodeResponse>(json)
            .unwrap()
            .place_name()
    }

    #[test]
    fn test_city_preferred() {
        let name = parse(serde_json::json!({
            "city": "Lyon",
            "locality": "Presqu'île",
            "principalSubdivision": "Auvergne-Rhône-Alpes"
        }));
        assert_eq!(name.as_deref(), Some("Lyon"));
    }

    #[test]
    fn test_blank_city_falls_back_to_locality() {
        let name = parse(serde_json::json!({
            "city": "",
            "locality": "Chamonix",
            "principalSubdivision": "Auvergne-Rhône-Alpes"
        }));
        assert_eq!(name.as_deref(), Some("Chamonix"));
    }

    #[test]
    fn test_subdivision_last_resort() {
        let name = parse(serde_json::json!({ "principalSubdivision": "Svalbard" }));
        assert_eq!(name.as_deref(), Some("Svalbard"));
    }

    #[test]
    fn test_nothing_usable() {
        assert!(parse(serde_json::json!({ "city": " " })).is_none());
    }

    #[tokio::test]
    async fn test_blank_query_skips_request() {
        // Unroutable URL: a request would fail, but none should be made.
        let client = GeocodeClient::new("http://127.0.0.1:9/reverse", "http://127.0.0.1:9/cities")
            .unwrap();
        assert!(client.suggest("   ").await.is_empty());
    }

    #[tokio::test]
    #[ignore] // Run with: cargo test -p weatherboard-weather -- --ignored
    async fn test_reverse_geocode_live() {
        let client = GeocodeClient::new(
            "https://api.bigdatacloud.net/data/reverse-geocode-client",
            "https://api.teleport.org/api/cities/",
        )
        .unwrap();
        let name = client
            .reverse_geocode(Coordinates {
                latitude: 47.6062,
                longitude: -122.3321,
            })
            .await;
        assert!(name.to_lowercase().contains("seattle"));
    }
}
