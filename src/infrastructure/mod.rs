// Infrastructure layer - External dependencies and adapters
pub mod cloudant_client;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod db2_repository;
pub mod pairs_client;
