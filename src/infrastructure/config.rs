use crate::domain::intervals::DEFAULT_MAX_POINTS;
use crate::domain::value_encoder::EncodingParams;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DashboardConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub encoding: EncodingParams,
    #[serde(default)]
    pub weather: WeatherSettings,
    #[serde(default)]
    pub db2: Db2Settings,
    #[serde(default)]
    pub cloudant: CloudantSettings,
    #[serde(default)]
    pub measures: MeasuresSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherSettings {
    #[serde(default = "default_weather_url")]
    pub base_url: String,
    #[serde(default = "default_max_points")]
    pub max_points: u32,
    #[serde(default = "default_layers")]
    pub layers: Vec<String>,
    #[serde(default = "default_weather_timeout")]
    pub timeout_secs: u64,
}

fn default_weather_url() -> String {
    "https://pairs.res.ibm.com".to_string()
}

fn default_max_points() -> u32 {
    DEFAULT_MAX_POINTS
}

fn default_layers() -> Vec<String> {
    vec!["49250".to_string(), "49309".to_string(), "49308".to_string()]
}

fn default_weather_timeout() -> u64 {
    120
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            base_url: default_weather_url(),
            max_points: default_max_points(),
            layers: default_layers(),
            timeout_secs: default_weather_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Db2Settings {
    #[serde(default = "default_db2_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_row_limit")]
    pub row_limit: u32,
}

fn default_db2_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    250
}

fn default_row_limit() -> u32 {
    100_000
}

impl Default for Db2Settings {
    fn default() -> Self {
        Self {
            timeout_secs: default_db2_timeout(),
            poll_interval_ms: default_poll_interval(),
            row_limit: default_row_limit(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CloudantSettings {
    pub database: String,
}

impl Default for CloudantSettings {
    fn default() -> Self {
        Self {
            database: "parcels".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MeasuresSettings {
    /// `id;description` file with management measures
    pub path: Option<String>,
}

/// `config/dashboard.toml` (optional) overridden by `NITRATE__SECTION__KEY`
/// environment variables.
pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    load_from(config::File::with_name("config/dashboard").required(false))
}

fn load_from<S>(file: S) -> anyhow::Result<DashboardConfig>
where
    S: config::Source + Send + Sync + 'static,
{
    let settings = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix("NITRATE")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("weather.layers")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Replace template variables in a query string
pub fn prepare_query(query: &str, vars: &HashMap<String, String>) -> String {
    let mut result = query.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}
