//! Configuration loader: merges config.toml, .env file, and env vars.

use std::path::Path;

use common::config::{AppConfig, StoreBackend};
use common::Error;

const MAX_STALE_AFTER_SECS: u64 = 86_400;

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_backend(raw: &str) -> Result<StoreBackend, Error> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "memory" | "mem" => Ok(StoreBackend::Memory),
        "sqlite" => Ok(StoreBackend::Sqlite),
        _ => Err(Error::Config(
            "METEO_STORE_BACKEND must be one of: memory, sqlite".into(),
        )),
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    let base_url = config.upstream.base_url.trim();
    if base_url.is_empty() {
        issues.push("upstream.base_url must not be empty".into());
    } else if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        issues.push("upstream.base_url must be an http(s) URL".into());
    }
    if config.upstream.timeout_secs == 0 {
        issues.push("upstream.timeout_secs must be > 0".into());
    }

    if config.cache.stale_after_secs == 0 {
        issues.push("cache.stale_after_secs must be > 0".into());
    }
    if config.cache.stale_after_secs > MAX_STALE_AFTER_SECS {
        issues.push(format!(
            "cache.stale_after_secs must be <= {MAX_STALE_AFTER_SECS}"
        ));
    }

    if config.store.backend == StoreBackend::Sqlite && config.store.sqlite_path.trim().is_empty() {
        issues.push("store.sqlite_path is required for the sqlite backend".into());
    }

    if config.events.topic.trim().is_empty() {
        issues.push("events.topic must not be empty".into());
    }
    if config.events.queue_capacity == 0 {
        issues.push("events.queue_capacity must be > 0".into());
    }
    if config.events.journal_dir.trim().is_empty() {
        issues.push("events.journal_dir must not be empty".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load configuration from an optional TOML file and the environment.
pub fn load_config(config_path: &Path) -> Result<AppConfig, Error> {
    // 1. Load .env file from the working directory or its parents.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Defaults, replaced by the config file when present.
    let mut config = AppConfig::default();
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", config_path.display(), e))
        })?;
        config = toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", config_path.display(), e))
        })?;
    }

    // 3. Environment overrides (highest priority).
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    validate_config(&config)?;
    Ok(config)
}

fn apply_env_overrides<F>(config: &mut AppConfig, var: F) -> Result<(), Error>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = var("METEO_UPSTREAM_URL") {
        config.upstream.base_url = url;
    }
    if let Some(raw) = var("METEO_UPSTREAM_TIMEOUT_SECS") {
        config.upstream.timeout_secs = parse_positive_u64(&raw, "METEO_UPSTREAM_TIMEOUT_SECS")?;
    }
    if let Some(raw) = var("METEO_STALE_AFTER_SECS") {
        config.cache.stale_after_secs = parse_positive_u64(&raw, "METEO_STALE_AFTER_SECS")?;
    }
    if let Some(raw) = var("METEO_STORE_BACKEND") {
        config.store.backend = parse_backend(&raw)?;
    }
    if let Some(path) = var("METEO_SQLITE_PATH") {
        config.store.sqlite_path = path;
    }
    if let Some(topic) = var("METEO_EVENT_TOPIC") {
        config.events.topic = topic;
    }
    if let Some(raw) = var("METEO_EVENT_QUEUE_CAPACITY") {
        config.events.queue_capacity =
            parse_positive_u64(&raw, "METEO_EVENT_QUEUE_CAPACITY")? as usize;
    }
    if let Some(dir) = var("METEO_EVENT_JOURNAL_DIR") {
        config.events.journal_dir = dir;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        validate_config(&AppConfig::default()).expect("defaults should validate");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("METEO_STORE_BACKEND", "memory"),
                ("METEO_STALE_AFTER_SECS", "120"),
                ("METEO_EVENT_TOPIC", "my-Topic"),
                ("METEO_UPSTREAM_URL", "http://localhost:8080/v1/forecast"),
            ]),
        )
        .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.cache.stale_after_secs, 120);
        assert_eq!(config.events.topic, "my-Topic");
        assert_eq!(config.upstream.base_url, "http://localhost:8080/v1/forecast");
    }

    #[test]
    fn test_bad_env_values_are_rejected() {
        let mut config = AppConfig::default();
        assert!(apply_env_overrides(&mut config, env(&[("METEO_STALE_AFTER_SECS", "0")])).is_err());
        assert!(apply_env_overrides(&mut config, env(&[("METEO_STORE_BACKEND", "mongo")])).is_err());
        assert!(
            apply_env_overrides(&mut config, env(&[("METEO_UPSTREAM_TIMEOUT_SECS", "soon")]))
                .is_err()
        );
    }

    #[test]
    fn test_validation_collects_every_issue() {
        let mut config = AppConfig::default();
        config.upstream.base_url = "ftp://example.com".into();
        config.events.queue_capacity = 0;
        config.events.topic = " ".into();

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("upstream.base_url"));
        assert!(err.contains("events.queue_capacity"));
        assert!(err.contains("events.topic"));
    }

    #[test]
    fn test_toml_document() {
        let config: AppConfig = toml::from_str(
            r#"
            [cache]
            stale_after_secs = 90

            [store]
            backend = "memory"
            "#,
        )
        .expect("toml should parse");

        assert_eq!(config.cache.stale_after_secs, 90);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.events.topic, "temperature-update");
    }
}
