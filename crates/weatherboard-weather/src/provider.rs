//! OpenWeatherMap client: current conditions and 3-hour forecast.

use crate::forecast::daily_samples;
use crate::types::{
    ForecastSample, LocationQuery, LocationWeather, Units, WeatherCondition, WeatherError,
    WeatherSnapshot,
};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MainBlock {
    temp: f64,
    feels_like: f64,
    humidity: u8,
    #[serde(default)]
    pressure: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WindBlock {
    speed: f64,
    #[serde(default)]
    deg: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ConditionBlock {
    #[serde(default)]
    id: i32,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SysBlock {
    #[serde(with = "chrono::serde::ts_seconds")]
    sunrise: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    sunset: DateTime<Utc>,
    country: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RainBlock {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
}

/// `GET /weather` response body
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CurrentResponse {
    #[serde(default)]
    name: String,
    main: MainBlock,
    wind: WindBlock,
    sys: SysBlock,
    #[serde(default)]
    weather: Vec<ConditionBlock>,
    rain: Option<RainBlock>,
}

impl CurrentResponse {
    pub(crate) fn into_snapshot(self, units: Units, fetched_at: DateTime<Utc>) -> WeatherSnapshot {
        let condition = self.weather.into_iter().next();
        WeatherSnapshot {
            place_name: self.name,
            country: self.sys.country,
            temperature: self.main.temp,
            feels_like: self.main.feels_like,
            humidity: self.main.humidity,
            pressure: self.main.pressure,
            wind_speed: self.wind.speed,
            wind_deg: self.wind.deg,
            sunrise: self.sys.sunrise,
            sunset: self.sys.sunset,
            condition: condition
                .as_ref()
                .map(|c| WeatherCondition::from_owm_id(c.id))
                .unwrap_or_default(),
            description: condition
                .as_ref()
                .map(|c| c.description.clone())
                .unwrap_or_default(),
            icon: condition.map(|c| c.icon).unwrap_or_default(),
            rain_1h: self.rain.and_then(|r| r.one_hour),
            units,
            fetched_at,
        }
    }
}

/// One entry of the `GET /forecast` list
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ForecastEntry {
    #[serde(with = "chrono::serde::ts_seconds")]
    dt: DateTime<Utc>,
    main: MainBlock,
    wind: WindBlock,
    #[serde(default)]
    weather: Vec<ConditionBlock>,
}

impl From<ForecastEntry> for ForecastSample {
    fn from(entry: ForecastEntry) -> Self {
        let condition = entry.weather.into_iter().next();
        Self {
            time: entry.dt,
            temperature: entry.main.temp,
            feels_like: entry.main.feels_like,
            humidity: entry.main.humidity,
            condition: condition
                .as_ref()
                .map(|c| WeatherCondition::from_owm_id(c.id))
                .unwrap_or_default(),
            description: condition
                .as_ref()
                .map(|c| c.description.clone())
                .unwrap_or_default(),
            icon: condition.map(|c| c.icon).unwrap_or_default(),
            wind_speed: entry.wind.speed,
            wind_deg: entry.wind.deg,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    list: Vec<ForecastEntry>,
}

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    base_url: String,
    api_key: String,
    units: Units,
}

impl WeatherProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        units: Units,
    ) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            units,
        })
    }

    /// Fetch current conditions and the daily forecast together.
    ///
    /// Both requests run concurrently; if either fails the whole fetch fails
    /// and nothing is returned.
    pub async fn fetch(&self, query: &LocationQuery) -> Result<LocationWeather, WeatherError> {
        let (snapshot, series) = tokio::try_join!(self.current(query), self.forecast(query))?;
        Ok(LocationWeather {
            snapshot,
            forecast: daily_samples(series),
        })
    }

    /// Current conditions for a place name or coordinates
    pub async fn current(&self, query: &LocationQuery) -> Result<WeatherSnapshot, WeatherError> {
        let body: CurrentResponse = self.get_json("weather", query).await?;
        Ok(body.into_snapshot(self.units, Utc::now()))
    }

    /// Raw 3-hour forecast series (before daily sampling)
    pub async fn forecast(
        &self,
        query: &LocationQuery,
    ) -> Result<Vec<ForecastSample>, WeatherError> {
        let body: ForecastResponse = self.get_json("forecast", query).await?;
        Ok(body.list.into_iter().map(ForecastSample::from).collect())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &'static str,
        query: &LocationQuery,
    ) -> Result<T, WeatherError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut params: Vec<(&str, String)> = match query {
            LocationQuery::Name(name) => vec![("q", name.clone())],
            LocationQuery::Coordinates(c) => vec![
                ("lat", c.latitude.to_string()),
                ("lon", c.longitude.to_string()),
            ],
        };
        params.push(("units", self.units.as_param().to_string()));
        params.push(("appid", self.api_key.clone()));

        tracing::debug!("GET {} for {:?}", url, query);
        let response = self.client.get(&url).query(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("Weather {} returned status {}", endpoint, status);
            return Err(WeatherError::Status { status, endpoint });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| WeatherError::Parse(format!("{} response: {}", endpoint, e)))
    }
}
