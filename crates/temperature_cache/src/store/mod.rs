//! Record persistence.
//!
//! Stores hold one record per coordinate key. There is no uniqueness
//! constraint on the key; instead every upsert settles the key onto a
//! single record atomically, so concurrent writers that each found nothing
//! still leave exactly one record behind.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use common::{CoordinateKey, Result, TemperatureRecord};

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The record for `key`, if any. Matching is exact on both components.
    async fn lookup(&self, key: CoordinateKey) -> Result<Option<TemperatureRecord>>;

    /// Persist `record` as the only record for its key.
    ///
    /// With `record.id` set, that identity is written. Without one, the
    /// store adopts the identity of the key's current record, or assigns a
    /// fresh one when there is none. Any other record for the key is
    /// removed in the same step. Returns the persisted record.
    async fn upsert(&self, record: TemperatureRecord) -> Result<TemperatureRecord>;

    /// Remove every record for `key`. Removing nothing is not an error.
    async fn delete_by_key(&self, key: CoordinateKey) -> Result<()>;
}

pub(crate) fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
