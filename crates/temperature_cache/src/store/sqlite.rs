//! SQLite-backed record store.
//!
//! One row per record: {id, latitude, longitude, temperature, observed_at}.
//! The (latitude, longitude) index is non-unique; `upsert` keeps one row
//! per key inside a `BEGIN IMMEDIATE` transaction, which also serialises
//! writers on other connections to the same database file.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use common::{CoordinateKey, Error, Result, TemperatureRecord};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use super::{new_record_id, RecordStore};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS temperature_data (
        id          TEXT PRIMARY KEY,
        latitude    REAL NOT NULL,
        longitude   REAL NOT NULL,
        temperature REAL NOT NULL,
        observed_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_temperature_data_coords
        ON temperature_data (latitude, longitude);
";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const NEWEST_FOR_KEY: &str = "
    SELECT id, temperature, observed_at FROM temperature_data
    WHERE latitude = ?1 AND longitude = ?2
    ORDER BY observed_at DESC LIMIT 1";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens or creates the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::Store(format!("Failed to open {}: {}", path.display(), e)))?;
        debug!("Opened record store at {}", path.display());
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT).map_err(store_err)?;
        conn.execute_batch(SCHEMA).map_err(store_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of rows stored for `key`.
    pub async fn count_for(&self, key: CoordinateKey) -> Result<usize> {
        let count: i64 = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM temperature_data WHERE latitude = ?1 AND longitude = ?2",
                    params![key.latitude(), key.longitude()],
                    |row| row.get(0),
                )
            })
            .await?;
        Ok(count.max(0) as usize)
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| Error::Store("connection lock poisoned".into()))?;
            f(&mut guard).map_err(store_err)
        })
        .await
        .map_err(|e| Error::Store(format!("store task failed: {e}")))?
    }
}

fn store_err(e: rusqlite::Error) -> Error {
    Error::Store(e.to_string())
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Store(format!("bad observed_at {raw:?}: {e}")))
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn lookup(&self, key: CoordinateKey) -> Result<Option<TemperatureRecord>> {
        let row: Option<(String, f64, String)> = self
            .with_conn(move |conn| {
                conn.query_row(
                    NEWEST_FOR_KEY,
                    params![key.latitude(), key.longitude()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
            })
            .await?;

        row.map(|(id, temperature, observed_at)| {
            Ok(TemperatureRecord {
                id: Some(id),
                key,
                temperature,
                observed_at: parse_ts(&observed_at)?,
            })
        })
        .transpose()
    }

    async fn upsert(&self, mut record: TemperatureRecord) -> Result<TemperatureRecord> {
        let key = record.key;
        let requested = record.id.clone();
        let temperature = record.temperature;
        let observed_at = format_ts(record.observed_at);

        let (id, pruned) = self
            .with_conn(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let id = match requested {
                    Some(id) => id,
                    None => tx
                        .query_row(
                            NEWEST_FOR_KEY,
                            params![key.latitude(), key.longitude()],
                            |row| row.get::<_, String>(0),
                        )
                        .optional()?
                        .unwrap_or_else(new_record_id),
                };
                tx.execute(
                    "INSERT INTO temperature_data (id, latitude, longitude, temperature, observed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(id) DO UPDATE SET
                         latitude = excluded.latitude,
                         longitude = excluded.longitude,
                         temperature = excluded.temperature,
                         observed_at = excluded.observed_at",
                    params![id, key.latitude(), key.longitude(), temperature, observed_at],
                )?;
                let pruned = tx.execute(
                    "DELETE FROM temperature_data
                     WHERE latitude = ?1 AND longitude = ?2 AND id <> ?3",
                    params![key.latitude(), key.longitude(), id],
                )?;
                tx.commit()?;
                Ok((id, pruned))
            })
            .await?;

        if pruned > 0 {
            debug!("{}: pruned {} duplicate row(s)", key, pruned);
        }
        record.id = Some(id);
        Ok(record)
    }

    async fn delete_by_key(&self, key: CoordinateKey) -> Result<()> {
        let removed = self
            .with_conn(move |conn| {
                conn.execute(
                    "DELETE FROM temperature_data WHERE latitude = ?1 AND longitude = ?2",
                    params![key.latitude(), key.longitude()],
                )
            })
            .await?;
        debug!("{}: removed {} row(s)", key, removed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn nyc() -> CoordinateKey {
        CoordinateKey::new(40.7128, -74.0060)
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-13T09:00:00.123456789Z")
            .expect("valid now")
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn test_insert_then_lookup_preserves_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        let saved = store
            .upsert(TemperatureRecord::candidate(nyc(), 25.0, t0()))
            .await
            .unwrap();

        let found = store.lookup(nyc()).await.unwrap().expect("record exists");
        assert_eq!(found, saved);
        assert_eq!(found.observed_at, t0());
    }

    #[tokio::test]
    async fn test_update_in_place_keeps_one_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let saved = store
            .upsert(TemperatureRecord::candidate(nyc(), 20.0, t0()))
            .await
            .unwrap();

        let mut update = TemperatureRecord::candidate(nyc(), 25.0, t0() + Duration::seconds(120));
        update.id = saved.id.clone();
        store.upsert(update).await.unwrap();

        assert_eq!(store.count_for(nyc()).await.unwrap(), 1);
        let found = store.lookup(nyc()).await.unwrap().unwrap();
        assert_eq!(found.id, saved.id);
        assert_eq!(found.temperature, 25.0);
    }

    async fn insert_raw(
        store: &SqliteStore,
        id: &str,
        temperature: f64,
        observed_at: DateTime<Utc>,
    ) {
        let id = id.to_string();
        let key = nyc();
        let observed_at = format_ts(observed_at);
        store
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO temperature_data (id, latitude, longitude, temperature, observed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![id, key.latitude(), key.longitude(), temperature, observed_at],
                )
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upsert_without_identity_adopts_existing_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = store
            .upsert(TemperatureRecord::candidate(nyc(), 20.0, t0()))
            .await
            .unwrap();
        let second = store
            .upsert(TemperatureRecord::candidate(nyc(), 22.0, t0() + Duration::seconds(5)))
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(store.count_for(nyc()).await.unwrap(), 1);
        let found = store.lookup(nyc()).await.unwrap().unwrap();
        assert_eq!(found.temperature, 22.0);
    }

    #[tokio::test]
    async fn test_lookup_prefers_newest_and_upsert_prunes_duplicates() {
        let store = SqliteStore::open_in_memory().unwrap();
        insert_raw(&store, "older", 20.0, t0()).await;
        insert_raw(&store, "newer", 22.0, t0() + Duration::seconds(5)).await;
        assert_eq!(store.count_for(nyc()).await.unwrap(), 2);

        let found = store.lookup(nyc()).await.unwrap().unwrap();
        assert_eq!(found.id.as_deref(), Some("newer"));

        let mut update = TemperatureRecord::candidate(nyc(), 25.0, t0() + Duration::seconds(90));
        update.id = found.id;
        store.upsert(update).await.unwrap();

        assert_eq!(store.count_for(nyc()).await.unwrap(), 1);
        let found = store.lookup(nyc()).await.unwrap().unwrap();
        assert_eq!(found.id.as_deref(), Some("newer"));
        assert_eq!(found.temperature, 25.0);
    }

    #[tokio::test]
    async fn test_concurrent_handles_on_one_file_keep_one_row() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache.db");
        let a = SqliteStore::open(&path).unwrap();
        let b = SqliteStore::open(&path).unwrap();

        let (ra, rb) = tokio::join!(
            a.upsert(TemperatureRecord::candidate(nyc(), 24.0, t0())),
            b.upsert(TemperatureRecord::candidate(nyc(), 26.0, t0())),
        );

        assert_eq!(ra.unwrap().id, rb.unwrap().id);
        assert_eq!(a.count_for(nyc()).await.unwrap(), 1);
        assert_eq!(b.count_for(nyc()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_key() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.delete_by_key(nyc()).await.unwrap();

        store
            .upsert(TemperatureRecord::candidate(nyc(), 25.0, t0()))
            .await
            .unwrap();
        store.delete_by_key(nyc()).await.unwrap();

        assert!(store.lookup(nyc()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_backed_store_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .upsert(TemperatureRecord::candidate(nyc(), 25.0, t0()))
                .await
                .unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        let found = reopened.lookup(nyc()).await.unwrap().unwrap();
        assert_eq!(found.temperature, 25.0);
    }
}
