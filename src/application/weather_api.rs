// Point queries against the external weather time-series API
use crate::domain::intervals::IntervalSet;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde::ser::SerializeStruct;

/// Request body of a point query: which layers, where, and when.
#[derive(Debug, Clone, PartialEq)]
pub struct PointQuery {
    pub layers: Vec<String>,
    pub lat: f64,
    pub lon: f64,
    pub intervals: IntervalSet,
}

#[derive(Serialize)]
struct LayerRef<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct Spatial {
    #[serde(rename = "type")]
    kind: &'static str,
    coordinates: [String; 2],
}

#[derive(Serialize)]
struct Temporal<'a> {
    intervals: &'a IntervalSet,
}

impl Serialize for PointQuery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let layers: Vec<LayerRef> = self.layers.iter().map(|id| LayerRef { id }).collect();

        let mut query = serializer.serialize_struct("PointQuery", 3)?;
        query.serialize_field("layers", &layers)?;
        query.serialize_field(
            "spatial",
            &Spatial {
                kind: "point",
                coordinates: [self.lat.to_string(), self.lon.to_string()],
            },
        )?;
        query.serialize_field(
            "temporal",
            &Temporal {
                intervals: &self.intervals,
            },
        )?;
        query.end()
    }
}

/// One value of one layer at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherPoint {
    pub layer_id: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[async_trait]
pub trait WeatherApi: Send + Sync {
    async fn point_query(&self, query: &PointQuery) -> anyhow::Result<Vec<WeatherPoint>>;
}
