pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod errors;
pub mod forest;
pub mod ingest;
pub mod memory;
pub mod metrics;
pub mod model;
pub mod rest;
pub mod scorer;
pub mod training;
pub mod validate;
