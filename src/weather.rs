//! Weather forecast at the user's location.
//!
//! [`WeatherClient`] (feature `http`) fetches a multi-day forecast from
//! weatherapi.com; [`WeatherKind`] maps free-text conditions onto the small
//! icon set the weather screen shows.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RunaRouteError};

/// Icon class for a weather condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum WeatherKind {
    Pouring,
    Lightning,
    Snowy,
    Sunny,
    PartlyCloudy,
    Fog,
}

impl WeatherKind {
    /// Classify a condition text such as "Patchy light rain".
    ///
    /// Keywords are checked in a fixed order, so "Thundery outbreaks" and
    /// "Light rain with thunder" resolve differently: rain wins over thunder.
    pub fn from_condition(text: &str) -> Self {
        let text = text.to_lowercase();
        if text.contains("rain") {
            Self::Pouring
        } else if text.contains("storm") {
            Self::Lightning
        } else if text.contains("snow") {
            Self::Snowy
        } else if text.contains("sunny") {
            Self::Sunny
        } else if text.contains("cloud") {
            Self::PartlyCloudy
        } else if text.contains("fog") {
            Self::Fog
        } else if text.contains("clear") {
            Self::Sunny
        } else if text.contains("thunder") {
            Self::Lightning
        } else {
            Self::PartlyCloudy
        }
    }

    /// Material Design icon name.
    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::Pouring => "weather-pouring",
            Self::Lightning => "weather-lightning",
            Self::Snowy => "weather-snowy-heavy",
            Self::Sunny => "weather-sunny",
            Self::PartlyCloudy => "weather-partly-cloudy",
            Self::Fog => "weather-fog",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentConditions {
    pub temp_c: f64,
    pub condition: String,
    pub wind_kph: f64,
    /// Percent
    pub humidity: u32,
}

impl CurrentConditions {
    pub fn kind(&self) -> WeatherKind {
        WeatherKind::from_condition(&self.condition)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub max_temp_c: f64,
    pub min_temp_c: f64,
    pub condition: String,
    /// Local time as reported, e.g. "05:21 AM"
    pub sunrise: String,
}

impl ForecastDay {
    pub fn kind(&self) -> WeatherKind {
        WeatherKind::from_condition(&self.condition)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherForecast {
    pub location_name: String,
    pub country: String,
    pub current: CurrentConditions,
    pub days: Vec<ForecastDay>,
}

impl WeatherForecast {
    pub fn today(&self) -> Option<&ForecastDay> {
        self.days.first()
    }
}

/// Configuration for the weather client.
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    /// Default: "https://api.weatherapi.com"
    pub base_url: String,

    /// Number of forecast days requested.
    /// Default: 7
    pub days: u32,

    /// Default: 15 seconds
    pub timeout: std::time::Duration,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.weatherapi.com".to_string(),
            days: 7,
            timeout: std::time::Duration::from_secs(15),
        }
    }
}

// ============================================================================
// weatherapi.com wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiResponse {
    location: ApiLocation,
    current: ApiCurrent,
    #[serde(default)]
    forecast: Option<ApiForecast>,
}

#[derive(Debug, Deserialize)]
struct ApiLocation {
    name: String,
    country: String,
}

#[derive(Debug, Deserialize)]
struct ApiCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiCurrent {
    temp_c: f64,
    condition: ApiCondition,
    wind_kph: f64,
    humidity: u32,
}

#[derive(Debug, Deserialize)]
struct ApiForecast {
    forecastday: Vec<ApiForecastDay>,
}

#[derive(Debug, Deserialize)]
struct ApiForecastDay {
    date: NaiveDate,
    day: ApiDay,
    astro: ApiAstro,
}

#[derive(Debug, Deserialize)]
struct ApiDay {
    maxtemp_c: f64,
    mintemp_c: f64,
    condition: ApiCondition,
}

#[derive(Debug, Deserialize)]
struct ApiAstro {
    sunrise: String,
}

/// Map a weatherapi.com `forecast.json` body into a [`WeatherForecast`].
pub fn parse_forecast_response(body: &[u8]) -> Result<WeatherForecast> {
    let data: ApiResponse = serde_json::from_slice(body)
        .map_err(|e| RunaRouteError::weather_fetch(format!("JSON parse error: {}", e), None))?;

    let days = data
        .forecast
        .map(|f| f.forecastday)
        .unwrap_or_default()
        .into_iter()
        .map(|d| ForecastDay {
            date: d.date,
            max_temp_c: d.day.maxtemp_c,
            min_temp_c: d.day.mintemp_c,
            condition: d.day.condition.text,
            sunrise: d.astro.sunrise,
        })
        .collect();

    Ok(WeatherForecast {
        location_name: data.location.name,
        country: data.location.country,
        current: CurrentConditions {
            temp_c: data.current.temp_c,
            condition: data.current.condition.text,
            wind_kph: data.current.wind_kph,
            humidity: data.current.humidity,
        },
        days,
    })
}

#[cfg(feature = "http")]
pub use client::WeatherClient;

#[cfg(feature = "http")]
mod client {
    use super::*;
    use crate::Coordinate;
    use log::{debug, info};
    use reqwest::Client;
    use std::time::Instant;

    /// weatherapi.com forecast client.
    pub struct WeatherClient {
        client: Client,
        api_key: String,
        config: WeatherConfig,
    }

    impl WeatherClient {
        pub fn new(api_key: &str) -> Result<Self> {
            Self::with_config(api_key, WeatherConfig::default())
        }

        pub fn with_config(api_key: &str, config: WeatherConfig) -> Result<Self> {
            let client = Client::builder()
                .timeout(config.timeout)
                .build()
                .map_err(|e| RunaRouteError::ConfigError {
                    message: format!("Failed to create HTTP client: {}", e),
                })?;
            Ok(Self {
                client,
                api_key: api_key.to_string(),
                config,
            })
        }

        /// Forecast for the given position.
        pub async fn forecast(&self, at: Coordinate) -> Result<WeatherForecast> {
            let start = Instant::now();
            let url = format!(
                "{}/v1/forecast.json",
                self.config.base_url.trim_end_matches('/')
            );
            let q = format!("{},{}", at.latitude, at.longitude);
            let days = self.config.days.to_string();

            let resp = self
                .client
                .get(&url)
                .query(&[
                    ("key", self.api_key.as_str()),
                    ("q", q.as_str()),
                    ("days", days.as_str()),
                    ("aqi", "no"),
                    ("alerts", "no"),
                ])
                .send()
                .await
                .map_err(|e| {
                    RunaRouteError::weather_fetch(
                        format!("Request error: {}", e),
                        e.status().map(|s| s.as_u16()),
                    )
                })?;

            let status = resp.status();
            if !status.is_success() {
                return Err(RunaRouteError::weather_fetch(
                    format!("HTTP {}", status),
                    Some(status.as_u16()),
                ));
            }

            let bytes = resp.bytes().await.map_err(|e| {
                RunaRouteError::weather_fetch(format!("Body download error: {}", e), None)
            })?;
            let forecast = parse_forecast_response(&bytes)?;
            debug!("[Weather] {:.1}KB in {:?}", bytes.len() as f64 / 1024.0, start.elapsed());
            info!(
                "[Weather] {} days for {}, {}",
                forecast.days.len(),
                forecast.location_name,
                forecast.country
            );
            Ok(forecast)
        }
    }
}
