pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod runtime;
pub mod services;
pub mod telemetry;
