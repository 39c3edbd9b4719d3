// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod error;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use anyhow::Context;
use axum::{routing::get, Router};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use crate::application::dashboard_service::NitrateDashboardService;
use crate::domain::intervals::IntervalPartitioner;
use crate::domain::measure_map::MeasureMap;
use crate::domain::value_encoder::ValueEncoder;
use crate::infrastructure::cloudant_client::CloudantParcelStore;
use crate::infrastructure::config::load_dashboard_config;
use crate::infrastructure::connection::LazyHandle;
use crate::infrastructure::db2_repository::Db2Repository;
use crate::infrastructure::pairs_client::PairsWeatherApi;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    health_check, list_users, measures, nearby_stations, parcel, point_weather,
    station_history, usage, user_measurements, user_weather, weather_intervals,
    weather_layers,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = load_dashboard_config().context("Failed to load dashboard configuration")?;

    let measure_map = match &config.measures.path {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read measure map {}", path))?;
            MeasureMap::parse(&text).with_context(|| format!("Invalid measure map {}", path))?
        }
        None => MeasureMap::default(),
    };
    if measure_map.is_empty() {
        tracing::info!("No management measures configured");
    } else {
        tracing::info!("Loaded {} management measures", measure_map.len());
    }

    // Connection handles are built on first use
    let repository = Arc::new(Db2Repository::new(
        Arc::new(LazyHandle::new("db2")),
        config.db2.clone(),
    ));
    let parcels = Arc::new(CloudantParcelStore::new(
        Arc::new(LazyHandle::new("cloudant")),
        config.cloudant.clone(),
    ));
    let weather = Arc::new(PairsWeatherApi::new(
        Arc::new(LazyHandle::new("pairs")),
        config.weather.clone(),
    ));

    let encoder = ValueEncoder::new(config.encoding);
    let partitioner = IntervalPartitioner::new(config.weather.max_points)?;
    tracing::info!(
        "Encoding with {} v{} (lambda {}), weather budget {} points",
        encoder.scale().name(),
        encoder.scale().version(),
        encoder.params().lambda,
        partitioner.max_points()
    );

    // Create service (application layer)
    let service = NitrateDashboardService::new(
        repository,
        parcels,
        weather,
        encoder,
        partitioner,
        config.weather.layers.clone(),
    );

    // Create application state
    let state = Arc::new(AppState {
        service,
        measures: Arc::new(measure_map),
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/users", get(list_users))
        .route("/usage", get(usage))
        .route("/users/:id/measurements", get(user_measurements))
        .route("/users/:id/weather", get(user_weather))
        .route("/parcels/:id", get(parcel))
        .route("/stations", get(nearby_stations))
        .route("/stations/:code/history", get(station_history))
        .route("/weather/layers", get(weather_layers))
        .route("/weather/point", get(point_weather))
        .route("/weather/intervals", get(weather_intervals))
        .route("/measures", get(measures))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind))?;
    tracing::info!("Starting nitrate-dashboard service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
