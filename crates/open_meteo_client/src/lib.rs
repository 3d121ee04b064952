//! Open-Meteo forecast API client.
//!
//! Fetches the current temperature for a coordinate pair from the
//! `current_weather` block of the forecast endpoint.

use std::time::Duration;

use async_trait::async_trait;
use common::config::UpstreamConfig;
use common::{CoordinateKey, Error, Result, UpstreamClient};
use serde::Deserialize;
use tracing::debug;

/// Open-Meteo API client.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
}

/// Forecast response. Only `current_weather.temperature` is consumed.
#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    current_weather: Option<ForecastCurrent>,
}

#[derive(Debug, Deserialize)]
struct ForecastCurrent {
    #[serde(default)]
    temperature: Option<f64>,
}

impl OpenMeteoClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Http(format!("failed to build Open-Meteo HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the current temperature at (`lat`, `lon`).
    pub async fn fetch_current_temperature(&self, lat: f64, lon: f64) -> Result<f64> {
        debug!("Fetching Open-Meteo current weather: {} lat={} lon={}", self.base_url, lat, lon);

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("current_weather", "true".to_string()),
            ])
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("HTTP error for ({lat},{lon}): {e}")))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "Open-Meteo returned {} for ({lat},{lon}): {}",
                status,
                truncate(&body, 500)
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Upstream(format!("body read error for ({lat},{lon}): {e}")))?;
        parse_temperature(&body)
            .map_err(|e| Error::Upstream(format!("bad payload for ({lat},{lon}): {e}")))
    }
}

#[async_trait]
impl UpstreamClient for OpenMeteoClient {
    async fn fetch(&self, key: CoordinateKey) -> Result<f64> {
        self.fetch_current_temperature(key.latitude(), key.longitude())
            .await
    }
}

fn truncate(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Extracts `current_weather.temperature` from a forecast body.
fn parse_temperature(body: &str) -> std::result::Result<f64, String> {
    if body.trim().is_empty() {
        return Err("empty body".into());
    }
    let payload: ForecastResponse =
        serde_json::from_str(body).map_err(|e| format!("JSON parse error: {e}"))?;
    payload
        .current_weather
        .ok_or_else(|| "missing current_weather".to_string())?
        .temperature
        .ok_or_else(|| "missing current_weather.temperature".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> &'static str {
        r#"{
            "latitude": 40.710335,
            "longitude": -73.99307,
            "generationtime_ms": 0.0520944595336914,
            "utc_offset_seconds": 0,
            "timezone": "GMT",
            "elevation": 32.0,
            "current_weather": {
                "temperature": 25.0,
                "windspeed": 11.2,
                "winddirection": 246,
                "weathercode": 1,
                "is_day": 1,
                "time": "2026-02-13T09:00"
            }
        }"#
    }

    #[test]
    fn test_deserialize_forecast_response() {
        let parsed: ForecastResponse =
            serde_json::from_str(sample_response()).expect("response should deserialize");

        let current = parsed.current_weather.expect("current weather present");
        assert_eq!(current.temperature, Some(25.0));
    }

    #[test]
    fn test_parse_temperature() {
        assert_eq!(parse_temperature(sample_response()), Ok(25.0));
    }

    #[test]
    fn test_missing_current_weather_is_an_error() {
        let err = parse_temperature(r#"{"latitude": 1.0, "longitude": 2.0}"#).unwrap_err();
        assert!(err.contains("current_weather"));
    }

    #[test]
    fn test_missing_temperature_is_an_error() {
        let err = parse_temperature(r#"{"current_weather": {"windspeed": 3.0}}"#).unwrap_err();
        assert!(err.contains("temperature"));
    }

    #[test]
    fn test_non_numeric_temperature_is_an_error() {
        assert!(parse_temperature(r#"{"current_weather": {"temperature": "warm"}}"#).is_err());
    }

    #[test]
    fn test_empty_body_is_an_error() {
        assert_eq!(parse_temperature("  "), Err("empty body".to_string()));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("°°°°", 2), "°°");
    }

    #[test]
    fn test_new_normalizes_base_url() {
        let config = UpstreamConfig {
            base_url: " http://localhost:8080/v1/forecast/ ".into(),
            ..UpstreamConfig::default()
        };
        let client = OpenMeteoClient::new(&config).expect("client should build");
        assert_eq!(client.base_url, "http://localhost:8080/v1/forecast");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_upstream_error() {
        let config = UpstreamConfig {
            base_url: "http://127.0.0.1:9/v1/forecast".into(),
            timeout_secs: 2,
            ..UpstreamConfig::default()
        };
        let client = OpenMeteoClient::new(&config).expect("client should build");

        let err = client
            .fetch(CoordinateKey::new(40.7128, -74.0060))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }
}
