// Application layer - Use cases over the measurement, parcel and weather stores
pub mod dashboard_service;
pub mod memoize;
pub mod nitrate_repository;
pub mod weather_api;
