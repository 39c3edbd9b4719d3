// HTTP request handlers
use crate::application::dashboard_service::DEFAULT_STATION_THRESHOLD;
use crate::application::weather_api::WeatherPoint;
use crate::domain::intervals::{IntervalPartitioner, IntervalSet};
use crate::domain::measure_map::MeasureMap;
use crate::domain::measurement::{
    latest_metric, DateWindow, LatestMetric, Measurement, StationMarker, StationSample,
    UserCount, WeatherReading,
};
use crate::domain::sample::Encoded;
use crate::domain::usage::UsageBucket;
use crate::error::DashboardError;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maps service errors to a status code and a `{"error": ..}` body.
#[derive(Debug)]
pub struct ApiError(DashboardError);

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            e if e.is_caller_error() => StatusCode::BAD_REQUEST,
            DashboardError::NotFound(_) => StatusCode::NOT_FOUND,
            DashboardError::Upstream(_) | DashboardError::MissingCredential(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        } else {
            tracing::debug!("Rejected request: {}", self.0);
        }

        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn default_min_meas() -> u32 {
    3
}

fn default_lookback_days() -> u32 {
    30
}

#[derive(Deserialize)]
pub struct UsersQuery {
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
    #[serde(default = "default_min_meas")]
    pub min_meas: u32,
}

#[derive(Deserialize)]
pub struct UsageQuery {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_min_meas")]
    pub min_meas: u32,
}

#[derive(Deserialize)]
pub struct StationsQuery {
    pub lat: f64,
    pub lon: f64,
    pub threshold: Option<f64>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub min_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct PointWeatherQuery {
    pub lat: f64,
    pub lon: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct IntervalsQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub max_points: Option<u32>,
}

#[derive(Serialize)]
pub struct MeasurementsResponse {
    pub rows: Arc<Vec<Encoded<Measurement>>>,
    pub latest: Option<LatestMetric>,
}

#[derive(Serialize)]
pub struct UserWeatherResponse {
    pub readings: Arc<Vec<WeatherReading>>,
    pub layers: Arc<BTreeMap<String, String>>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Users with more than `min_meas` measurements in the window
pub async fn list_users(
    Query(query): Query<UsersQuery>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Arc<Vec<UserCount>>> {
    let window = DateWindow {
        min_date: query.min_date,
        max_date: query.max_date,
    };
    Ok(Json(state.service.user_counts(window, query.min_meas).await?))
}

pub async fn usage(
    Query(query): Query<UsageQuery>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Arc<Vec<UsageBucket>>> {
    Ok(Json(
        state
            .service
            .usage(query.lookback_days, query.min_meas)
            .await?,
    ))
}

pub async fn user_measurements(
    Path(user_id): Path<i64>,
    Query(window): Query<DateWindow>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<MeasurementsResponse> {
    let rows = state.service.user_measurements(user_id, window).await?;

    let tail: Vec<Measurement> = rows
        .iter()
        .skip(rows.len().saturating_sub(2))
        .map(|encoded| encoded.row.clone())
        .collect();

    Ok(Json(MeasurementsResponse {
        latest: latest_metric(&tail),
        rows,
    }))
}

/// Stored weather rows of a user plus the layer lookup to label them
pub async fn user_weather(
    Path(user_id): Path<i64>,
    Query(window): Query<DateWindow>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<UserWeatherResponse> {
    let (readings, layers) = futures::future::try_join(
        state.service.weather_readings(user_id, window),
        state.service.weather_layers(),
    )
    .await?;

    Ok(Json(UserWeatherResponse { readings, layers }))
}

pub async fn parcel(
    Path(parcel_id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Arc<serde_json::Value>> {
    Ok(Json(state.service.parcel(parcel_id).await?))
}

pub async fn nearby_stations(
    Query(query): Query<StationsQuery>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Arc<Vec<Encoded<StationMarker>>>> {
    let threshold = query.threshold.unwrap_or(DEFAULT_STATION_THRESHOLD);
    Ok(Json(
        state
            .service
            .nearby_stations(query.lat, query.lon, threshold)
            .await?,
    ))
}

pub async fn station_history(
    Path(station_code): Path<String>,
    Query(query): Query<HistoryQuery>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Arc<Vec<StationSample>>> {
    let since = query
        .min_date
        .or_else(|| NaiveDate::from_ymd_opt(1900, 1, 1))
        .unwrap_or(NaiveDate::MIN);

    Ok(Json(
        state.service.station_history(&station_code, since).await?,
    ))
}

pub async fn weather_layers(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Arc<BTreeMap<String, String>>> {
    Ok(Json(state.service.weather_layers().await?))
}

pub async fn point_weather(
    Query(query): Query<PointWeatherQuery>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Arc<Vec<WeatherPoint>>> {
    Ok(Json(
        state
            .service
            .point_weather(query.lat, query.lon, query.start, query.end)
            .await?,
    ))
}

/// Temporal block the weather API would be queried with. `max_points`
/// overrides the configured budget.
pub async fn weather_intervals(
    Query(query): Query<IntervalsQuery>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<IntervalSet> {
    let partitioner = match query.max_points {
        Some(max_points) => IntervalPartitioner::new(max_points)?,
        None => state.service.partitioner(),
    };
    Ok(Json(partitioner.partition(query.start, query.end)?))
}

pub async fn measures(State(state): State<Arc<AppState>>) -> Json<Arc<MeasureMap>> {
    Json(state.measures.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dashboard_service::NitrateDashboardService;
    use crate::application::nitrate_repository::{NitrateRepository, ParcelStore, WeatherLayer};
    use crate::application::weather_api::{PointQuery, WeatherApi};
    use crate::domain::measurement::{
        MeasurementRow, StationReading, UserActivity,
    };
    use crate::domain::value_encoder::ValueEncoder;
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct FakeRepository;

    fn row(day: u32, value: f64) -> MeasurementRow {
        MeasurementRow {
            timestamp: Some(Utc.with_ymd_and_hms(2021, 3, day, 12, 0, 0).unwrap()),
            value: Some(value),
            latitude: Some(52.0),
            longitude: Some(5.0),
            category: Some("grondwater".to_string()),
            confidence: Some(0.8),
            meetpunt_code_ihw: Some("NL-3".to_string()),
        }
    }

    #[async_trait]
    impl NitrateRepository for FakeRepository {
        async fn user_measurements(
            &self,
            _user_id: i64,
            _window: DateWindow,
        ) -> anyhow::Result<Vec<MeasurementRow>> {
            Ok(vec![row(20, 30.0), row(2, 10.0), row(11, 25.0)])
        }

        async fn user_counts(&self, _window: DateWindow, _min_meas: u32) -> anyhow::Result<Vec<UserCount>> {
            Ok(vec![UserCount { user_id: 7, count: 12 }])
        }

        async fn user_activity(&self, _min_meas: u32) -> anyhow::Result<Vec<UserActivity>> {
            Ok(Vec::new())
        }

        async fn nearby_stations(
            &self,
            _lat: f64,
            _lon: f64,
            _threshold: f64,
        ) -> anyhow::Result<Vec<StationReading>> {
            anyhow::bail!("connection reset")
        }

        async fn station_history(
            &self,
            _station_code: &str,
            _since: NaiveDate,
        ) -> anyhow::Result<Vec<StationSample>> {
            Ok(Vec::new())
        }

        async fn weather_readings(
            &self,
            _user_id: i64,
            _window: DateWindow,
        ) -> anyhow::Result<Vec<WeatherReading>> {
            Ok(Vec::new())
        }

        async fn weather_layers(&self) -> anyhow::Result<Vec<WeatherLayer>> {
            Ok(vec![WeatherLayer {
                layer_id: "49309".to_string(),
                layer_name: "Temperature".to_string(),
            }])
        }
    }

    struct NoParcels;

    #[async_trait]
    impl ParcelStore for NoParcels {
        async fn find_parcel(&self, _parcel_id: i64) -> anyhow::Result<Option<serde_json::Value>> {
            Ok(None)
        }
    }

    struct NoWeather;

    #[async_trait]
    impl WeatherApi for NoWeather {
        async fn point_query(&self, _query: &PointQuery) -> anyhow::Result<Vec<WeatherPoint>> {
            Ok(Vec::new())
        }
    }

    fn state() -> State<Arc<AppState>> {
        let service = NitrateDashboardService::new(
            Arc::new(FakeRepository),
            Arc::new(NoParcels),
            Arc::new(NoWeather),
            ValueEncoder::default(),
            IntervalPartitioner::new(5).unwrap(),
            vec!["49309".to_string()],
        );
        State(Arc::new(AppState {
            service,
            measures: Arc::new(MeasureMap::parse("1;Cover crop\n").unwrap()),
        }))
    }

    fn window(min: (i32, u32, u32), max: (i32, u32, u32)) -> DateWindow {
        DateWindow {
            min_date: NaiveDate::from_ymd_opt(min.0, min.1, min.2).unwrap(),
            max_date: NaiveDate::from_ymd_opt(max.0, max.1, max.2).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_measurements_with_latest_metric() {
        let Json(body) = user_measurements(
            Path(7),
            Query(window((2021, 1, 1), (2021, 12, 31))),
            state(),
        )
        .await
        .unwrap();

        assert_eq!(body.rows.len(), 3);
        let latest = body.latest.unwrap();
        assert_eq!(latest.value, 30.0);
        assert_eq!(latest.delta, 5.0);
        assert_eq!(latest.timestamp, Utc.with_ymd_and_hms(2021, 3, 20, 12, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_inverted_window_is_bad_request() {
        let err = user_measurements(
            Path(7),
            Query(window((2021, 12, 31), (2021, 1, 1))),
            state(),
        )
        .await
        .err()
        .unwrap();

        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_parcel_is_not_found() {
        let err = parcel(Path(99), state()).await.err().unwrap();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_gateway() {
        let query = StationsQuery {
            lat: 52.0,
            lon: 5.0,
            threshold: None,
        };
        let err = nearby_stations(Query(query), state()).await.err().unwrap();
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_user_weather_joins_layers() {
        let Json(body) = user_weather(
            Path(7),
            Query(window((2021, 1, 1), (2021, 2, 1))),
            state(),
        )
        .await
        .unwrap();

        assert!(body.readings.is_empty());
        assert_eq!(body.layers.get("Temperature").map(String::as_str), Some("49309"));
    }

    fn nine_days(max_points: Option<u32>) -> IntervalsQuery {
        IntervalsQuery {
            start: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2020, 1, 10, 0, 0, 0).unwrap(),
            max_points,
        }
    }

    #[tokio::test]
    async fn test_weather_intervals_explicit_budget() {
        let Json(intervals) = weather_intervals(Query(nine_days(Some(30))), state())
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(&intervals).unwrap(),
            serde_json::json!([
                { "start": "2020-01-01T00:00:00Z", "end": "2020-01-10T00:00:00Z" }
            ])
        );

        let err = weather_intervals(Query(nine_days(Some(0))), state())
            .await
            .err()
            .unwrap();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_weather_intervals_default_to_configured_budget() {
        let Json(intervals) = weather_intervals(Query(nine_days(None)), state())
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(&intervals).unwrap(),
            serde_json::json!([
                { "snapshot": "2020-01-01T00:00:00Z" },
                { "snapshot": "2020-01-03T00:00:00Z" },
                { "snapshot": "2020-01-05T00:00:00Z" },
                { "snapshot": "2020-01-07T00:00:00Z" },
                { "snapshot": "2020-01-09T00:00:00Z" },
                { "snapshot": "2020-01-10T00:00:00Z" }
            ])
        );
    }

    #[tokio::test]
    async fn test_measures_served() {
        let Json(measures) = measures(state()).await;
        assert_eq!(measures.get(1), Some("Cover crop"));
    }
}
