//! Geo-keyed read-through temperature cache.
//!
//! Serves the freshest known temperature for a coordinate pair from a
//! record store, refreshing from the upstream weather API when the stored
//! record is stale or absent, and publishes a notification for every
//! served reading.

pub mod cache;
pub mod clock;
pub mod events;
pub mod policy;
pub mod store;

pub use cache::TemperatureCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{format_event, EventJournal, EventSink, QueuedSink};
pub use policy::StalenessPolicy;
pub use store::{MemoryStore, RecordStore, SqliteStore};
pub use common::UpstreamClient;
