// Dashboard service - Memoized, encoded datasets for the nitrate dashboard
use crate::application::memoize::{CacheKey, Memoized};
use crate::application::nitrate_repository::{NitrateRepository, ParcelStore};
use crate::application::weather_api::{PointQuery, WeatherApi, WeatherPoint};
use crate::domain::intervals::IntervalPartitioner;
use crate::domain::measurement::{
    DateWindow, Measurement, StationMarker, StationSample, UserCount, WeatherReading,
};
use crate::domain::sample::{encode_samples, Encoded, Fade};
use crate::domain::usage::{active_users_per_window, UsageBucket};
use crate::domain::value_encoder::ValueEncoder;
use crate::error::{DashboardError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DEFAULT_STATION_THRESHOLD: f64 = 0.3;

/// One cache per fetch operation, shared by every clone of the service.
struct DatasetCaches {
    measurements: Memoized<Vec<Encoded<Measurement>>>,
    user_counts: Memoized<Vec<UserCount>>,
    usage: Memoized<Vec<UsageBucket>>,
    stations: Memoized<Vec<Encoded<StationMarker>>>,
    station_history: Memoized<Vec<StationSample>>,
    weather_readings: Memoized<Vec<WeatherReading>>,
    weather_layers: Memoized<BTreeMap<String, String>>,
    parcels: Memoized<serde_json::Value>,
    point_weather: Memoized<Vec<WeatherPoint>>,
}

impl DatasetCaches {
    fn new() -> Self {
        Self {
            measurements: Memoized::new("user_measurements"),
            user_counts: Memoized::new("user_counts"),
            usage: Memoized::new("usage"),
            stations: Memoized::new("nearby_stations"),
            station_history: Memoized::new("station_history"),
            weather_readings: Memoized::new("weather_readings"),
            weather_layers: Memoized::new("weather_layers"),
            parcels: Memoized::new("parcels"),
            point_weather: Memoized::new("point_weather"),
        }
    }
}

#[derive(Clone)]
pub struct NitrateDashboardService {
    repository: Arc<dyn NitrateRepository>,
    parcels: Arc<dyn ParcelStore>,
    weather: Arc<dyn WeatherApi>,
    encoder: ValueEncoder,
    partitioner: IntervalPartitioner,
    weather_layers: Vec<String>,
    caches: Arc<DatasetCaches>,
}

impl NitrateDashboardService {
    pub fn new(
        repository: Arc<dyn NitrateRepository>,
        parcels: Arc<dyn ParcelStore>,
        weather: Arc<dyn WeatherApi>,
        encoder: ValueEncoder,
        partitioner: IntervalPartitioner,
        weather_layers: Vec<String>,
    ) -> Self {
        Self {
            repository,
            parcels,
            weather,
            encoder,
            partitioner,
            weather_layers,
            caches: Arc::new(DatasetCaches::new()),
        }
    }

    /// Partitioner used for weather API point queries.
    pub fn partitioner(&self) -> IntervalPartitioner {
        self.partitioner
    }

    /// A user's complete measurements, sorted by time, colored by value and
    /// faded by age within the window.
    pub async fn user_measurements(
        &self,
        user_id: i64,
        window: DateWindow,
    ) -> Result<Arc<Vec<Encoded<Measurement>>>> {
        validate_window(window)?;
        let key = CacheKey::new(&(user_id, window))?;

        self.caches
            .measurements
            .get_or_try_fetch(key, || async {
                let rows = self.repository.user_measurements(user_id, window).await?;
                let fetched = rows.len();

                let mut measurements: Vec<Measurement> =
                    rows.into_iter().filter_map(|row| row.complete()).collect();
                measurements.sort_by_key(|m| m.timestamp);

                tracing::debug!(
                    "Kept {} of {} measurements for user {}",
                    measurements.len(),
                    fetched,
                    user_id
                );

                encode_samples(measurements, &self.encoder, Fade::ByAge)
            })
            .await
    }

    pub async fn user_counts(
        &self,
        window: DateWindow,
        min_meas: u32,
    ) -> Result<Arc<Vec<UserCount>>> {
        validate_window(window)?;
        let key = CacheKey::new(&(window, min_meas))?;

        self.caches
            .user_counts
            .get_or_try_fetch(key, || async {
                Ok::<_, DashboardError>(self.repository.user_counts(window, min_meas).await?)
            })
            .await
    }

    /// Distinct active users per `lookback_days` window.
    pub async fn usage(&self, lookback_days: u32, min_meas: u32) -> Result<Arc<Vec<UsageBucket>>> {
        let key = CacheKey::new(&(lookback_days, min_meas))?;

        self.caches
            .usage
            .get_or_try_fetch(key, || async {
                let activity = self.repository.user_activity(min_meas).await?;
                Ok::<_, DashboardError>(active_users_per_window(&activity, lookback_days))
            })
            .await
    }

    /// Reference stations around a location, colored by their latest value.
    pub async fn nearby_stations(
        &self,
        lat: f64,
        lon: f64,
        threshold: f64,
    ) -> Result<Arc<Vec<Encoded<StationMarker>>>> {
        let key = CacheKey::new(&(lat, lon, threshold))?;

        self.caches
            .stations
            .get_or_try_fetch(key, || async {
                let readings = self.repository.nearby_stations(lat, lon, threshold).await?;
                let markers: Vec<StationMarker> =
                    readings.into_iter().map(StationMarker::new).collect();
                encode_samples(markers, &self.encoder, Fade::Opaque)
            })
            .await
    }

    pub async fn station_history(
        &self,
        station_code: &str,
        since: NaiveDate,
    ) -> Result<Arc<Vec<StationSample>>> {
        let key = CacheKey::new(&(station_code, since))?;

        self.caches
            .station_history
            .get_or_try_fetch(key, || async {
                let mut samples = self.repository.station_history(station_code, since).await?;
                samples.sort_by_key(|s| s.timestamp);
                Ok::<_, DashboardError>(samples)
            })
            .await
    }

    pub async fn weather_readings(
        &self,
        user_id: i64,
        window: DateWindow,
    ) -> Result<Arc<Vec<WeatherReading>>> {
        validate_window(window)?;
        let key = CacheKey::new(&(user_id, window))?;

        self.caches
            .weather_readings
            .get_or_try_fetch(key, || async {
                Ok::<_, DashboardError>(self.repository.weather_readings(user_id, window).await?)
            })
            .await
    }

    /// Layer name → layer id.
    pub async fn weather_layers(&self) -> Result<Arc<BTreeMap<String, String>>> {
        let key = CacheKey::new(&())?;

        self.caches
            .weather_layers
            .get_or_try_fetch(key, || async {
                let layers = self.repository.weather_layers().await?;
                let by_name: BTreeMap<String, String> = layers
                    .into_iter()
                    .map(|l| (l.layer_name, l.layer_id))
                    .collect();
                Ok::<_, DashboardError>(by_name)
            })
            .await
    }

    pub async fn parcel(&self, parcel_id: i64) -> Result<Arc<serde_json::Value>> {
        let key = CacheKey::new(&(parcel_id,))?;

        self.caches
            .parcels
            .get_or_try_fetch(key, || async {
                self.parcels
                    .find_parcel(parcel_id)
                    .await?
                    .ok_or_else(|| DashboardError::NotFound(format!("parcel {}", parcel_id)))
            })
            .await
    }

    /// Weather API values at a location; the window is split into intervals
    /// that fit the API's point budget.
    pub async fn point_weather(
        &self,
        lat: f64,
        lon: f64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Arc<Vec<WeatherPoint>>> {
        let intervals = self.partitioner.partition(start, end)?;
        let key = CacheKey::new(&(lat, lon, start, end))?;

        self.caches
            .point_weather
            .get_or_try_fetch(key, || async {
                let query = PointQuery {
                    layers: self.weather_layers.clone(),
                    lat,
                    lon,
                    intervals,
                };
                Ok::<_, DashboardError>(self.weather.point_query(&query).await?)
            })
            .await
    }
}

/// Midnight UTC at the start of `date`.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn validate_window(window: DateWindow) -> Result<()> {
    if window.max_date < window.min_date {
        return Err(DashboardError::InvalidRange {
            start: start_of_day(window.min_date),
            end: start_of_day(window.max_date),
        });
    }
    Ok(())
}
