//! Service configuration types.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream weather API settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Cache freshness settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Record persistence settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Notification event settings.
    #[serde(default)]
    pub events: EventsConfig,
}

/// Upstream weather API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Forecast endpoint; queried with latitude/longitude/current_weather.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request deadline in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Cache freshness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// A record is stale once strictly more than this many seconds have
    /// elapsed since it was observed.
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

/// Record persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    /// Database file, used by the sqlite backend.
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
}

/// Notification event settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Topic every served reading is published to.
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Bounded queue between the read path and the publisher task.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Directory for the daily JSONL event journal.
    #[serde(default = "default_journal_dir")]
    pub journal_dir: String,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://api.open-meteo.com/v1/forecast".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_user_agent() -> String {
    "meteo-cache/0.1 (temperature cache)".into()
}

fn default_stale_after() -> u64 {
    60
}

fn default_backend() -> StoreBackend {
    StoreBackend::Sqlite
}
fn default_sqlite_path() -> String {
    "meteo-cache.db".into()
}

fn default_topic() -> String {
    "temperature-update".into()
}
fn default_queue_capacity() -> usize {
    256
}
fn default_journal_dir() -> String {
    "events".into()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            sqlite_path: default_sqlite_path(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            queue_capacity: default_queue_capacity(),
            journal_dir: default_journal_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.cache.stale_after_secs, 60);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.events.topic, "temperature-update");
        assert!(config.upstream.base_url.starts_with("https://api.open-meteo.com"));
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"store": {"backend": "memory"}, "events": {"topic": "my-Topic"}}"#,
        )
        .expect("config should deserialize");

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.sqlite_path, "meteo-cache.db");
        assert_eq!(config.events.topic, "my-Topic");
        assert_eq!(config.events.queue_capacity, 256);
        assert_eq!(config.upstream.timeout_secs, 10);
    }
}
