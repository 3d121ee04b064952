//! Read-through temperature cache.
//!
//! `get` serves a stored record while it is fresh and otherwise refreshes
//! it from the upstream client. Refresh failures of any kind surface as
//! `Error::NotFound`; stale data is never served in their place.
//!
//! Refreshes for the same key are serialised in-process by a per-key
//! async mutex. Across processes sharing a store there is no lock: each
//! refresh re-reads the store right before writing and adopts the identity
//! of any record it finds, and the store's upsert keeps a single record per
//! key even when two writers both saw nothing. The last upsert wins.

use std::sync::Arc;

use common::{
    CoordinateKey, Error, Result, TemperatureReading, TemperatureRecord, UpstreamClient,
};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::events::{format_event, EventSink};
use crate::policy::StalenessPolicy;
use crate::store::RecordStore;

type RefreshLocks = DashMap<(u64, u64), Arc<Mutex<()>>>;

pub struct TemperatureCache {
    clock: Arc<dyn Clock>,
    upstream: Arc<dyn UpstreamClient>,
    store: Arc<dyn RecordStore>,
    sink: Arc<dyn EventSink>,
    policy: StalenessPolicy,
    refresh_locks: RefreshLocks,
}

impl TemperatureCache {
    pub fn new(
        clock: Arc<dyn Clock>,
        upstream: Arc<dyn UpstreamClient>,
        store: Arc<dyn RecordStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            clock,
            upstream,
            store,
            sink,
            policy: StalenessPolicy::default(),
            refresh_locks: DashMap::new(),
        }
    }

    pub fn with_policy(mut self, policy: StalenessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Current temperature for `key`.
    ///
    /// Fails with `InvalidCoordinates` before any I/O, with `NotFound` when
    /// no fresh record exists and a refresh could not produce one, and with
    /// `Store` when the initial lookup itself fails.
    pub async fn get(&self, key: CoordinateKey) -> Result<f64> {
        key.validate()?;

        let record = match self.store.lookup(key).await? {
            Some(record) if !self.is_stale(&record) => {
                debug!("{}: cache hit ({:.2})", key, record.temperature);
                record
            }
            existing => {
                debug!(
                    "{}: {}, refreshing",
                    key,
                    if existing.is_some() { "stale" } else { "miss" }
                );
                self.refresh_exclusive(key).await.map_err(|e| {
                    warn!("{}: refresh failed: {}", key, e);
                    Error::NotFound {
                        latitude: key.latitude(),
                        longitude: key.longitude(),
                    }
                })?
            }
        };

        self.notify(key, record.temperature);
        Ok(record.temperature)
    }

    /// Removes the record for `key`. Removing an absent record succeeds.
    pub async fn delete(&self, key: CoordinateKey) -> Result<()> {
        key.validate()?;
        self.store.delete_by_key(key).await?;
        info!("{}: deleted", key);
        Ok(())
    }

    /// `get` for raw coordinates, echoing them back with the temperature.
    pub async fn read_temperature(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<TemperatureReading> {
        let key = CoordinateKey::new(latitude, longitude);
        let temperature = self.get(key).await?;
        Ok(TemperatureReading::new(key, temperature))
    }

    /// `delete` for raw coordinates.
    pub async fn delete_temperature(&self, latitude: f64, longitude: f64) -> Result<()> {
        self.delete(CoordinateKey::new(latitude, longitude)).await
    }

    fn is_stale(&self, record: &TemperatureRecord) -> bool {
        self.policy.is_stale(record.observed_at, self.clock.now())
    }

    async fn refresh_exclusive(&self, key: CoordinateKey) -> Result<TemperatureRecord> {
        let slot = RefreshSlot::claim(&self.refresh_locks, key);
        self.refresh_under(slot.lock(), key).await
    }

    async fn refresh_under(
        &self,
        lock: &Mutex<()>,
        key: CoordinateKey,
    ) -> Result<TemperatureRecord> {
        let _guard = match lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("{}: waiting for in-flight refresh", key);
                let guard = lock.lock().await;
                if let Some(record) = self.store.lookup(key).await? {
                    if !self.is_stale(&record) {
                        return Ok(record);
                    }
                }
                guard
            }
        };
        self.refresh(key).await
    }

    /// One upstream fetch, then reconcile against whatever the store holds
    /// now and persist.
    async fn refresh(&self, key: CoordinateKey) -> Result<TemperatureRecord> {
        let temperature = self.upstream.fetch(key).await?;
        if !temperature.is_finite() {
            return Err(Error::Upstream(format!(
                "non-finite temperature {} for {}",
                temperature, key
            )));
        }

        let mut candidate = TemperatureRecord::candidate(key, temperature, self.clock.now());
        match self.store.lookup(key).await? {
            Some(existing) => {
                candidate.id = existing.id;
                info!(
                    "{}: updating {:.2} -> {:.2}",
                    key, existing.temperature, temperature
                );
            }
            None => info!("{}: inserting {:.2}", key, temperature),
        }

        self.store.upsert(candidate).await
    }

    fn notify(&self, key: CoordinateKey, temperature: f64) {
        if let Err(e) = self.sink.publish(format_event(key, temperature)) {
            warn!("{}: event dropped: {}", key, e);
        }
    }
}

/// A claim on the refresh lock for one key. Dropping it, including when
/// the owning future is cancelled, releases the map entry once no other
/// caller holds a claim.
struct RefreshSlot<'a> {
    locks: &'a RefreshLocks,
    bits: (u64, u64),
    lock: Option<Arc<Mutex<()>>>,
}

impl<'a> RefreshSlot<'a> {
    fn claim(locks: &'a RefreshLocks, key: CoordinateKey) -> Self {
        let bits = key.bits();
        let lock = locks
            .entry(bits)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Self {
            locks,
            bits,
            lock: Some(lock),
        }
    }

    fn lock(&self) -> &Mutex<()> {
        match &self.lock {
            Some(lock) => lock.as_ref(),
            None => unreachable!("lock is only taken on drop"),
        }
    }
}

impl Drop for RefreshSlot<'_> {
    fn drop(&mut self) {
        self.lock.take();
        self.locks
            .remove_if(&self.bits, |_, lock| Arc::strong_count(lock) == 1);
    }
}
