// Repository traits for the measurement store and the parcel document store
use crate::domain::measurement::{
    DateWindow, MeasurementRow, StationReading, StationSample, UserActivity, UserCount,
    WeatherReading,
};
use async_trait::async_trait;
use chrono::NaiveDate;

/// A weather layer stored alongside the measurements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherLayer {
    pub layer_id: String,
    pub layer_name: String,
}

#[async_trait]
pub trait NitrateRepository: Send + Sync {
    /// Measurements of one user inside the window, in any order
    async fn user_measurements(
        &self,
        user_id: i64,
        window: DateWindow,
    ) -> anyhow::Result<Vec<MeasurementRow>>;

    /// Users with more than `min_meas` measurements inside the window
    async fn user_counts(&self, window: DateWindow, min_meas: u32) -> anyhow::Result<Vec<UserCount>>;

    /// Every measurement timestamp of users with more than `min_meas` measurements
    async fn user_activity(&self, min_meas: u32) -> anyhow::Result<Vec<UserActivity>>;

    /// Latest NO3 reading of every reference station within `threshold`
    /// degrees of the location
    async fn nearby_stations(
        &self,
        lat: f64,
        lon: f64,
        threshold: f64,
    ) -> anyhow::Result<Vec<StationReading>>;

    /// NO3 history of one reference station after `since`
    async fn station_history(
        &self,
        station_code: &str,
        since: NaiveDate,
    ) -> anyhow::Result<Vec<StationSample>>;

    /// Stored weather rows of one user inside the window
    async fn weather_readings(
        &self,
        user_id: i64,
        window: DateWindow,
    ) -> anyhow::Result<Vec<WeatherReading>>;

    async fn weather_layers(&self) -> anyhow::Result<Vec<WeatherLayer>>;
}

#[async_trait]
pub trait ParcelStore: Send + Sync {
    /// First parcel document whose `properties.OBJECTID` equals `parcel_id`
    async fn find_parcel(&self, parcel_id: i64) -> anyhow::Result<Option<serde_json::Value>>;
}
