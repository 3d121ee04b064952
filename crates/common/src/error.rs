//! Unified error type for meteo-cache.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "Invalid coordinates ({latitude}, {longitude}): latitude must be in range of -90 to 90° and longitude from -180 to 180°"
    )]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("Temperature data not found for ({latitude}, {longitude})")]
    NotFound { latitude: f64, longitude: f64 },

    #[error("Upstream weather API error: {0}")]
    Upstream(String),

    #[error("Event sink error: {0}")]
    Sink(String),

    #[error("Record store error: {0}")]
    Store(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
