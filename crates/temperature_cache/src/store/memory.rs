//! In-memory record store.

use std::sync::Mutex;

use async_trait::async_trait;
use common::{CoordinateKey, Error, Result, TemperatureRecord};
use dashmap::DashMap;

use super::{new_record_id, RecordStore};

/// Records keyed by identity, with lookups scanning for the coordinate
/// key, like a document store without a uniqueness index. Writes are
/// serialised so the read-then-write in `upsert` is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, TemperatureRecord>,
    writes: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored for `key`.
    pub fn count_for(&self, key: CoordinateKey) -> usize {
        self.records.iter().filter(|r| r.key == key).count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn newest(&self, key: CoordinateKey) -> Option<TemperatureRecord> {
        self.records
            .iter()
            .filter(|r| r.key == key)
            .max_by_key(|r| r.observed_at)
            .map(|r| r.value().clone())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn lookup(&self, key: CoordinateKey) -> Result<Option<TemperatureRecord>> {
        Ok(self.newest(key))
    }

    async fn upsert(&self, mut record: TemperatureRecord) -> Result<TemperatureRecord> {
        let _write = self
            .writes
            .lock()
            .map_err(|_| Error::Store("write lock poisoned".into()))?;

        if record.id.is_none() {
            record.id = self.newest(record.key).and_then(|existing| existing.id);
        }
        let id = record.id.get_or_insert_with(new_record_id).clone();
        let key = record.key;
        self.records.retain(|other, r| r.key != key || *other == id);
        self.records.insert(id, record.clone());
        Ok(record)
    }

    async fn delete_by_key(&self, key: CoordinateKey) -> Result<()> {
        self.records.retain(|_, r| r.key != key);
        Ok(())
    }
}
