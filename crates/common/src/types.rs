//! Domain types shared across the cache, its stores, and the upstream client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;
pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;

// ── Keys ──────────────────────────────────────────────────────────────

/// A (latitude, longitude) pair identifying a cached location.
///
/// Equality is exact `f64` equality on both components; no rounding is
/// applied. `-0.0` is folded into `0.0` at construction so that keys that
/// compare equal also hash equal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateKey {
    latitude: f64,
    longitude: f64,
}

impl CoordinateKey {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: latitude + 0.0,
            longitude: longitude + 0.0,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Both components inside their closed ranges. NaN is never valid.
    pub fn is_valid(&self) -> bool {
        (MIN_LATITUDE..=MAX_LATITUDE).contains(&self.latitude)
            && (MIN_LONGITUDE..=MAX_LONGITUDE).contains(&self.longitude)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::InvalidCoordinates {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }

    /// Bit pattern of both components, usable as a hash key.
    pub fn bits(&self) -> (u64, u64) {
        (self.latitude.to_bits(), self.longitude.to_bits())
    }
}

impl std::fmt::Display for CoordinateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

// ── Records ───────────────────────────────────────────────────────────

/// A persisted temperature observation. At most one per `CoordinateKey`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureRecord {
    /// Store-assigned identity; `None` until first persisted.
    pub id: Option<String>,
    pub key: CoordinateKey,
    pub temperature: f64,
    pub observed_at: DateTime<Utc>,
}

impl TemperatureRecord {
    /// A candidate record that has not been persisted yet.
    pub fn candidate(key: CoordinateKey, temperature: f64, observed_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            key,
            temperature,
            observed_at,
        }
    }
}

// ── Responses ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub temperature: f64,
}

/// Response for a temperature read: the served value plus the echoed
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub latitude: f64,
    pub longitude: f64,
    pub current_weather: CurrentWeather,
}

impl TemperatureReading {
    pub fn new(key: CoordinateKey, temperature: f64) -> Self {
        Self {
            latitude: key.latitude(),
            longitude: key.longitude(),
            current_weather: CurrentWeather { temperature },
        }
    }

    pub fn temperature(&self) -> f64 {
        self.current_weather.temperature
    }
}
