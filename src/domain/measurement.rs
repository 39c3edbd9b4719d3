// Nitrate measurement domain models
use super::sample::Sample;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DAY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "surface water")]
    SurfaceWater,
    #[serde(rename = "ground water")]
    GroundWater,
    #[serde(rename = "other")]
    Other,
}

impl Category {
    /// Map the free-text label a user picked in the app (Dutch or English).
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "oppervlaktewater" | "surface water" => Category::SurfaceWater,
            "grondwater" | "groundwater" => Category::GroundWater,
            _ => Category::Other,
        }
    }
}

/// A user measurement as returned by the store; any field may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeasurementRow {
    pub timestamp: Option<DateTime<Utc>>,
    pub value: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub category: Option<String>,
    pub confidence: Option<f64>,
    pub meetpunt_code_ihw: Option<String>,
}

impl MeasurementRow {
    /// `None` if any field is missing.
    pub fn complete(self) -> Option<Measurement> {
        let timestamp = self.timestamp?;
        Some(Measurement {
            timestamp,
            timestamp_str: timestamp.format(DAY_FORMAT).to_string(),
            value: self.value?,
            latitude: self.latitude?,
            longitude: self.longitude?,
            category: Category::from_label(&self.category?),
            confidence: self.confidence?,
            station_code: self.meetpunt_code_ihw?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub timestamp: DateTime<Utc>,
    pub timestamp_str: String,
    pub value: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub category: Category,
    pub confidence: f64,
    pub station_code: String,
}

impl Sample for Measurement {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn value(&self) -> f64 {
        self.value
    }
}

/// Latest reading of a reference (MNLSO) station near a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationReading {
    pub station_code: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationMarker {
    #[serde(flatten)]
    pub reading: StationReading,
    pub timestamp_str: String,
    pub category: &'static str,
}

impl StationMarker {
    pub fn new(reading: StationReading) -> Self {
        Self {
            timestamp_str: reading.timestamp.format(DAY_FORMAT).to_string(),
            category: "MNLSO",
            reading,
        }
    }
}

impl Sample for StationMarker {
    fn timestamp(&self) -> DateTime<Utc> {
        self.reading.timestamp
    }

    fn value(&self) -> f64 {
        self.reading.value
    }
}

/// A point of a station's NO3 history. Rows without a growing season are
/// not part of the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSample {
    pub station_code: String,
    pub timestamp: DateTime<Utc>,
    pub season: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub layer_id: String,
    pub layer_name: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCount {
    pub user_id: i64,
    pub count: i64,
}

/// One (user, timestamp) pair used for activity statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserActivity {
    pub user_id: i64,
    pub timestamp: DateTime<Utc>,
}

/// Window of dates a dataset is requested for, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestMetric {
    pub value: f64,
    pub delta: f64,
    pub timestamp: DateTime<Utc>,
}

/// Most recent measurement and its change against the one before it.
/// Expects measurements sorted by timestamp.
pub fn latest_metric(measurements: &[Measurement]) -> Option<LatestMetric> {
    let (last, rest) = measurements.split_last()?;
    let previous = rest.last().unwrap_or(last);

    Some(LatestMetric {
        value: last.value,
        delta: last.value - previous.value,
        timestamp: last.timestamp,
    })
}
