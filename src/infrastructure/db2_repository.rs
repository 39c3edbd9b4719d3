// Db2 repository implementation over the Db2 REST SQL API
use crate::application::nitrate_repository::{NitrateRepository, WeatherLayer};
use crate::domain::measurement::{
    DateWindow, MeasurementRow, StationReading, StationSample, UserActivity, UserCount,
    WeatherReading, DAY_FORMAT,
};
use crate::infrastructure::config::{prepare_query, Db2Settings};
use crate::infrastructure::connection::LazyHandle;
use crate::infrastructure::credentials::Db2Credentials;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const USER_MEASUREMENTS_SQL: &str = r#"
SELECT n."timestamp", n."value", n.latitude, n.longitude, n.category, n.confidence, n.meetpunt_code_ihw
FROM NITRATEAPP_NL_WITH_LOC_ID AS n
INNER JOIN NITRATE_ID_MAPPING AS m ON n.id = m.nitrate_id
WHERE m.parcel_id = ${user_id}
  AND n."timestamp" >= '${min_date}' AND n."timestamp" <= '${max_date}'
ORDER BY n."timestamp""#;

const USER_COUNTS_SQL: &str = r#"
SELECT m.parcel_id AS userid, COUNT(*) AS counts
FROM NITRATEAPP AS n
INNER JOIN NITRATE_ID_MAPPING AS m ON n.id = m.nitrate_id
WHERE n."timestamp" >= '${min_date}' AND n."timestamp" <= '${max_date}'
GROUP BY m.parcel_id
HAVING COUNT(*) > ${min_meas}"#;

const USER_ACTIVITY_SQL: &str = r#"
SELECT m.parcel_id AS userid, n."timestamp"
FROM NITRATEAPP AS n
INNER JOIN NITRATE_ID_MAPPING AS m ON n.id = m.nitrate_id
WHERE m.parcel_id IN (
  SELECT t.parcel_id FROM NITRATE_ID_MAPPING AS t GROUP BY t.parcel_id HAVING COUNT(*) > ${min_meas}
)"#;

const NEARBY_STATIONS_SQL: &str = r#"
WITH recent_mnlso AS (
  SELECT m.meetpunt_code, m.datum, m.waarde
  FROM MNLSO AS m
  WHERE m.parameter_code = 'NO3'
    AND m.datum = (SELECT MAX(mm.datum) FROM MNLSO AS mm WHERE mm.meetpunt_code = m.meetpunt_code)
)
SELECT r.meetpunt_code, r.datum AS timestamp, r.waarde AS value,
       CAST(l.lat AS DOUBLE) AS lat, CAST(l.lon AS DOUBLE) AS lon
FROM recent_mnlso AS r
INNER JOIN LOCATIONS AS l ON l.meetpunt_code_ihw = r.meetpunt_code
WHERE ABS(CAST(l.lat AS DOUBLE) - ${lat}) < ${threshold}
  AND ABS(CAST(l.lon AS DOUBLE) - ${lon}) < ${threshold}"#;

const STATION_HISTORY_SQL: &str = r#"
SELECT datum AS timestamp, groeiseizoen AS season, waarde AS value, meetpunt_code
FROM MNLSO
WHERE meetpunt_code = '${station_code}' AND parameter_code = 'NO3' AND datum > '${since}'
ORDER BY datum"#;

const WEATHER_READINGS_SQL: &str = r#"
SELECT layer_id, layer_name, meas_time AS timestamp, meas_value AS value
FROM WEATHERDATA
WHERE userid = ${user_id} AND meas_time >= '${min_date}' AND meas_time <= '${max_date}'"#;

const WEATHER_LAYERS_SQL: &str = "SELECT DISTINCT layer_id, layer_name FROM WEATHERDATA";

/// An authenticated session against the Db2 REST API.
pub struct Db2Client {
    http: reqwest::Client,
    base_url: String,
    token: String,
    deployment_id: String,
    poll_interval: Duration,
    /// Upper bound on waiting for one SQL job to finish
    job_timeout: Duration,
    row_limit: u32,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct SqlJobCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SqlJobStatus {
    status: String,
    #[serde(default)]
    results: Vec<ResultSet>,
}

/// Columns and rows of one SQL statement.
#[derive(Debug, Default, Deserialize)]
pub struct ResultSet {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
    #[serde(default)]
    error: Option<String>,
}

impl Db2Client {
    /// Authenticate with credentials from the environment.
    pub async fn connect(settings: &Db2Settings) -> crate::error::Result<Self> {
        let credentials = Db2Credentials::from_env()?;
        let base_url = credentials.base_url();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build Db2 HTTP client")?;

        let response = http
            .post(format!("{}/dbapi/v4/auth/tokens", base_url))
            .json(&serde_json::json!({
                "userid": credentials.username,
                "password": credentials.password,
            }))
            .send()
            .await
            .context("Failed to send authentication request to Db2")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(
                anyhow::anyhow!("Db2 authentication failed with status {}: {}", status, body)
                    .into(),
            );
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .context("Failed to parse Db2 authentication response")?
            .token;

        tracing::info!("Authenticated against Db2 at {} as {}", base_url, credentials.username);

        Ok(Self {
            http,
            base_url,
            token,
            deployment_id: credentials.database,
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            job_timeout: Duration::from_secs(settings.timeout_secs),
            row_limit: settings.row_limit,
        })
    }

    async fn execute_query(&self, sql: &str) -> Result<ResultSet> {
        tracing::debug!("Executing Db2 query: {}", sql.trim());

        let response = self
            .http
            .post(format!("{}/dbapi/v4/sql_jobs", self.base_url))
            .bearer_auth(&self.token)
            .header("x-deployment-id", &self.deployment_id)
            .json(&serde_json::json!({
                "commands": sql.trim(),
                "limit": self.row_limit,
                "separator": ";",
                "stop_on_error": "yes",
            }))
            .send()
            .await
            .context("Failed to send request to Db2")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Db2 query failed with status {}: {}", status, body);
        }

        let job = response
            .json::<SqlJobCreated>()
            .await
            .context("Failed to parse Db2 job response")?;

        let collected = tokio::time::timeout(self.job_timeout, self.collect_results(&job.id))
            .await
            .map_err(|_| {
                tracing::warn!("Db2 job {} still running after {:?}", job.id, self.job_timeout);
                anyhow::anyhow!(
                    "Db2 job {} did not complete within {:?}",
                    job.id,
                    self.job_timeout
                )
            })??;

        tracing::debug!("Db2 job {} returned {} rows", job.id, collected.rows.len());
        Ok(collected)
    }

    /// Poll a job until it completes, gathering the result chunks.
    async fn collect_results(&self, job_id: &str) -> Result<ResultSet> {
        let job_url = format!(
            "{}/dbapi/v4/sql_jobs/{}",
            self.base_url,
            urlencoding::encode(job_id)
        );

        // Results arrive in chunks while the job runs
        let mut collected = ResultSet::default();
        loop {
            let status = self
                .http
                .get(&job_url)
                .bearer_auth(&self.token)
                .header("x-deployment-id", &self.deployment_id)
                .send()
                .await
                .context("Failed to poll Db2 job")?
                .error_for_status()
                .context("Db2 job poll rejected")?
                .json::<SqlJobStatus>()
                .await
                .context("Failed to parse Db2 job status")?;

            for chunk in status.results {
                if let Some(error) = chunk.error {
                    anyhow::bail!("Db2 query error: {}", error);
                }
                if collected.columns.is_empty() {
                    collected.columns = chunk.columns;
                }
                collected.rows.extend(chunk.rows);
            }

            match status.status.as_str() {
                "completed" => break,
                "failed" => anyhow::bail!("Db2 job {} failed", job_id),
                _ => tokio::time::sleep(self.poll_interval).await,
            }
        }

        Ok(collected)
    }
}

pub struct Db2Repository {
    connection: Arc<LazyHandle<Db2Client>>,
    settings: Db2Settings,
}

impl Db2Repository {
    pub fn new(connection: Arc<LazyHandle<Db2Client>>, settings: Db2Settings) -> Self {
        Self {
            connection,
            settings,
        }
    }

    async fn query(&self, template: &str, vars: &HashMap<String, String>) -> Result<ResultSet> {
        let client = self
            .connection
            .get_or_try_init(|| Db2Client::connect(&self.settings))
            .await?;

        client.execute_query(&prepare_query(template, vars)).await
    }
}

fn window_vars(window: DateWindow) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert("min_date".to_string(), window.min_date.format(DAY_FORMAT).to_string());
    vars.insert("max_date".to_string(), window.max_date.format(DAY_FORMAT).to_string());
    vars
}

/// Quote-escape a value placed inside a SQL string literal.
fn sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

#[async_trait]
impl NitrateRepository for Db2Repository {
    async fn user_measurements(
        &self,
        user_id: i64,
        window: DateWindow,
    ) -> Result<Vec<MeasurementRow>> {
        let mut vars = window_vars(window);
        vars.insert("user_id".to_string(), user_id.to_string());

        let result = self.query(USER_MEASUREMENTS_SQL, &vars).await?;
        Ok(decode_measurements(&result))
    }

    async fn user_counts(&self, window: DateWindow, min_meas: u32) -> Result<Vec<UserCount>> {
        let mut vars = window_vars(window);
        vars.insert("min_meas".to_string(), min_meas.to_string());

        let result = self.query(USER_COUNTS_SQL, &vars).await?;
        Ok(result
            .records()
            .filter_map(|r| {
                Some(UserCount {
                    user_id: r.int("userid")?,
                    count: r.int("counts")?,
                })
            })
            .collect())
    }

    async fn user_activity(&self, min_meas: u32) -> Result<Vec<UserActivity>> {
        let mut vars = HashMap::new();
        vars.insert("min_meas".to_string(), min_meas.to_string());

        let result = self.query(USER_ACTIVITY_SQL, &vars).await?;
        Ok(result
            .records()
            .filter_map(|r| {
                Some(UserActivity {
                    user_id: r.int("userid")?,
                    timestamp: r.timestamp("timestamp")?,
                })
            })
            .collect())
    }

    async fn nearby_stations(
        &self,
        lat: f64,
        lon: f64,
        threshold: f64,
    ) -> Result<Vec<StationReading>> {
        let mut vars = HashMap::new();
        vars.insert("lat".to_string(), lat.to_string());
        vars.insert("lon".to_string(), lon.to_string());
        vars.insert("threshold".to_string(), threshold.to_string());

        let result = self.query(NEARBY_STATIONS_SQL, &vars).await?;
        Ok(decode_stations(&result))
    }

    async fn station_history(
        &self,
        station_code: &str,
        since: NaiveDate,
    ) -> Result<Vec<StationSample>> {
        let mut vars = HashMap::new();
        vars.insert("station_code".to_string(), sql_string(station_code));
        vars.insert("since".to_string(), since.format(DAY_FORMAT).to_string());

        let result = self.query(STATION_HISTORY_SQL, &vars).await?;
        Ok(decode_history(&result))
    }

    async fn weather_readings(
        &self,
        user_id: i64,
        window: DateWindow,
    ) -> Result<Vec<WeatherReading>> {
        let mut vars = window_vars(window);
        vars.insert("user_id".to_string(), user_id.to_string());

        let result = self.query(WEATHER_READINGS_SQL, &vars).await?;
        Ok(result
            .records()
            .filter_map(|r| {
                Some(WeatherReading {
                    layer_id: r.string("layer_id")?,
                    layer_name: r.string("layer_name")?,
                    timestamp: r.timestamp("timestamp")?,
                    value: r.f64("value")?,
                })
            })
            .collect())
    }

    async fn weather_layers(&self) -> Result<Vec<WeatherLayer>> {
        let result = self.query(WEATHER_LAYERS_SQL, &HashMap::new()).await?;
        Ok(result
            .records()
            .filter_map(|r| {
                Some(WeatherLayer {
                    layer_id: r.string("layer_id")?,
                    layer_name: r.string("layer_name")?,
                })
            })
            .collect())
    }
}

fn decode_measurements(result: &ResultSet) -> Vec<MeasurementRow> {
    result
        .records()
        .map(|r| MeasurementRow {
            timestamp: r.timestamp("timestamp"),
            value: r.f64("value"),
            latitude: r.f64("latitude"),
            longitude: r.f64("longitude"),
            category: r.string("category"),
            confidence: r.f64("confidence"),
            meetpunt_code_ihw: r.string("meetpunt_code_ihw"),
        })
        .collect()
}

fn decode_stations(result: &ResultSet) -> Vec<StationReading> {
    result
        .records()
        .filter_map(|r| {
            Some(StationReading {
                station_code: r.string("meetpunt_code")?,
                timestamp: r.timestamp("timestamp")?,
                value: r.f64("value")?,
                lat: r.f64("lat")?,
                lon: r.f64("lon")?,
            })
        })
        .collect()
}

fn decode_history(result: &ResultSet) -> Vec<StationSample> {
    result
        .records()
        .filter_map(|r| {
            Some(StationSample {
                station_code: r.string("meetpunt_code")?,
                timestamp: r.timestamp("timestamp")?,
                season: r.string("season")?,
                value: r.f64("value")?,
            })
        })
        .collect()
}

impl ResultSet {
    fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(|values| Record {
            columns: &self.columns,
            values,
        })
    }
}

/// One row, addressed by case-insensitive column name.
struct Record<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl Record<'_> {
    fn get(&self, name: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))?;
        self.values.get(idx).filter(|v| !v.is_null())
    }

    fn f64(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn string(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        parse_timestamp(self.get(name)?.as_str()?)
    }
}

/// Db2 renders timestamps as `2021-06-03 09:30:00.000000` and dates as
/// `2021-06-03`; both are taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d-%H.%M.%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, DAY_FORMAT)
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}
