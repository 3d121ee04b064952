//! Notification events for served readings.

mod journal;
mod queue;

pub use journal::EventJournal;
pub use queue::{spawn_publisher, QueuedSink};

use common::{CoordinateKey, Result};

/// Fire-and-forget publication of a formatted event.
///
/// Implementations must not block the caller; a failure is reported but
/// the cache never lets it affect a read.
pub trait EventSink: Send + Sync {
    fn publish(&self, message: String) -> Result<()>;
}

/// `Lat: 40.7128, Lon: -74.0060, Temp: 25.00`
pub fn format_event(key: CoordinateKey, temperature: f64) -> String {
    format!(
        "Lat: {:.4}, Lon: {:.4}, Temp: {:.2}",
        key.latitude(),
        key.longitude(),
        temperature
    )
}
