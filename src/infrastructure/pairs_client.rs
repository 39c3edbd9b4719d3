// HTTP client for the PAIRS weather time-series API
use crate::application::weather_api::{PointQuery, WeatherApi, WeatherPoint};
use crate::infrastructure::config::WeatherSettings;
use crate::infrastructure::connection::LazyHandle;
use crate::infrastructure::credentials::BasicCredentials;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub struct PairsClient {
    http: reqwest::Client,
    base_url: String,
    credentials: BasicCredentials,
}

impl PairsClient {
    pub async fn connect(settings: WeatherSettings) -> crate::error::Result<Self> {
        let credentials = BasicCredentials::from_env("PAIRS_USERNAME", "PAIRS_PASSWORD")?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build PAIRS HTTP client")?;

        tracing::info!("Using PAIRS at {}", settings.base_url);
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub async fn submit(&self, query: &PointQuery) -> Result<Vec<WeatherPoint>> {
        let url = format!("{}/v2/query", self.base_url);
        tracing::debug!(
            "PAIRS point query at ({}, {}) over {} intervals",
            query.lat,
            query.lon,
            query.intervals.len()
        );

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .json(query)
            .send()
            .await
            .context("Failed to send request to PAIRS")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("PAIRS query failed with status {}: {}", status, body);
        }

        let body = response
            .json::<QueryResponse>()
            .await
            .context("Failed to parse PAIRS response")?;

        body.into_points()
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: Vec<RawPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPoint {
    layer_id: serde_json::Value,
    /// epoch milliseconds
    timestamp: i64,
    value: serde_json::Value,
}

/// Numbers come back either as JSON numbers or as strings.
fn as_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl QueryResponse {
    fn into_points(self) -> Result<Vec<WeatherPoint>> {
        let mut points = Vec::with_capacity(self.data.len());
        for raw in self.data {
            let Some(value) = as_number(&raw.value) else {
                tracing::warn!("Skipping non-numeric PAIRS value: {}", raw.value);
                continue;
            };
            let timestamp = DateTime::<Utc>::from_timestamp_millis(raw.timestamp)
                .with_context(|| format!("Timestamp out of range: {}", raw.timestamp))?;

            points.push(WeatherPoint {
                layer_id: as_text(&raw.layer_id),
                timestamp,
                value,
            });
        }
        Ok(points)
    }
}

pub struct PairsWeatherApi {
    connection: Arc<LazyHandle<PairsClient>>,
    settings: WeatherSettings,
}

impl PairsWeatherApi {
    pub fn new(connection: Arc<LazyHandle<PairsClient>>, settings: WeatherSettings) -> Self {
        Self {
            connection,
            settings,
        }
    }
}

#[async_trait]
impl WeatherApi for PairsWeatherApi {
    async fn point_query(&self, query: &PointQuery) -> Result<Vec<WeatherPoint>> {
        let settings = self.settings.clone();
        let client = self
            .connection
            .get_or_try_init(|| PairsClient::connect(settings))
            .await?;

        client.submit(query).await
    }
}
