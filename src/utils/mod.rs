// src/utils/mod.rs
//! Common utilities: configuration, errors, timestamps

pub mod clock;
pub mod config;
pub mod errors;

pub use config::TelemetryConfig;
pub use errors::{Result, TelemetryError};
