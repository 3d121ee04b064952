//! Shared types, config, and error definitions for meteo-cache.

pub mod config;
pub mod error;
pub mod types;
pub mod upstream;

pub use config::AppConfig;
pub use error::Error;
pub use types::*;
pub use upstream::UpstreamClient;

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
