//! meteo-cache: read-through cache for current temperatures.
//!
//! Single-binary Tokio application that:
//! 1. Loads config (config.toml, .env, environment)
//! 2. Opens the record store and the event journal
//! 3. Serves one read or delete against the cache
//! 4. Flushes queued notification events before exiting

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use common::config::{AppConfig, StoreBackend};
use common::Error;
use open_meteo_client::OpenMeteoClient;
use temperature_cache::events::spawn_publisher;
use temperature_cache::{
    EventJournal, MemoryStore, QueuedSink, RecordStore, SqliteStore, StalenessPolicy,
    SystemClock, TemperatureCache,
};

/// Geo-keyed temperature cache in front of Open-Meteo
#[derive(Parser)]
#[command(name = "meteo-cache", about = "Read-through temperature cache")]
struct Cli {
    /// Path to the TOML config file (optional).
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the current temperature for a coordinate pair.
    Get {
        #[arg(long, allow_negative_numbers = true)]
        latitude: f64,
        #[arg(long, allow_negative_numbers = true)]
        longitude: f64,
    },
    /// Delete the cached record for a coordinate pair.
    Delete {
        #[arg(long, allow_negative_numbers = true)]
        latitude: f64,
        #[arg(long, allow_negative_numbers = true)]
        longitude: f64,
    },
}

const EXIT_NOT_FOUND: u8 = 1;
const EXIT_INVALID: u8 = 2;
const EXIT_FAILURE: u8 = 3;

fn exit_code_for(err: &Error) -> u8 {
    match err {
        Error::NotFound { .. } => EXIT_NOT_FOUND,
        Error::InvalidCoordinates { .. } => EXIT_INVALID,
        _ => EXIT_FAILURE,
    }
}

fn open_store(cfg: &AppConfig) -> Result<Arc<dyn RecordStore>, Error> {
    match cfg.store.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Sqlite => {
            let path = PathBuf::from(cfg.store.sqlite_path.trim());
            Ok(Arc::new(SqliteStore::open(&path)?))
        }
    }
}

async fn run(cfg: AppConfig, command: Command) -> Result<(), Error> {
    let store = open_store(&cfg)?;
    let upstream = OpenMeteoClient::new(&cfg.upstream)?;

    let journal = EventJournal::open(PathBuf::from(cfg.events.journal_dir.trim()))?;
    let (sink, rx) = QueuedSink::channel(cfg.events.queue_capacity);
    let publisher = spawn_publisher(rx, cfg.events.topic.clone(), journal);

    let cache = TemperatureCache::new(
        Arc::new(SystemClock),
        Arc::new(upstream),
        store,
        Arc::new(sink),
    )
    .with_policy(StalenessPolicy::from_secs(cfg.cache.stale_after_secs));

    let result = match command {
        Command::Get {
            latitude,
            longitude,
        } => match cache.read_temperature(latitude, longitude).await {
            Ok(reading) => {
                println!("{}", serde_json::to_string_pretty(&reading)?);
                Ok(())
            }
            Err(e) => Err(e),
        },
        Command::Delete {
            latitude,
            longitude,
        } => cache.delete_temperature(latitude, longitude).await,
    };

    // Dropping the cache closes the queue; wait for queued events to land.
    drop(cache);
    match publisher.await {
        Ok(delivered) => info!("Published {} event(s)", delivered),
        Err(e) => error!("Event publisher task failed: {}", e),
    }

    result
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "meteo_cache=info,temperature_cache=info,open_meteo_client=info".into()
            }),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = match config::load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    info!(
        "Upstream: {} (timeout {}s), store: {:?}, stale after {}s, topic: {}",
        cfg.upstream.base_url,
        cfg.upstream.timeout_secs,
        cfg.store.backend,
        cfg.cache.stale_after_secs,
        cfg.events.topic
    );

    match run(cfg, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}
