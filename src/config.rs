use std::path::PathBuf;
use std::time::Duration;

use crate::reporter::{DEFAULT_GRACE, DEFAULT_TICK};
use crate::worker::CHUNK_SIZE;

/// application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// directory uploaded files are written to
    pub files_dir: PathBuf,
    /// listen address
    pub host: String,
    /// listen port
    pub port: u16,
    /// maximum upload request size in bytes
    pub max_upload_size: usize,
    /// number of tokio worker threads
    pub worker_threads: usize,
    /// cors allowed origins (comma-separated), empty allows any
    pub cors_origins: Vec<String>,
    /// rate limit on uploads: one request replenished every this many milliseconds
    pub rate_limit_replenish_ms: u64,
    /// rate limit on uploads: burst size
    pub rate_limit_burst: u32,
    /// progress stream cadence
    pub tick_interval: Duration,
    /// how long finished uploads stay visible
    pub grace_period: Duration,
    /// bytes read per chunk while ingesting
    pub chunk_size: usize,
    /// optional template file for rendered progress lines
    pub progress_template: Option<PathBuf>,
    /// how long to wait for open connections after a shutdown signal
    pub shutdown_timeout: Duration,
}

impl Config {
    /// load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        // parse cors origins
        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            files_dir: std::env::var("FILES_DIR")
                .unwrap_or_else(|_| "./files".to_string())
                .into(),
            host: std::env::var("HOST")
                .unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_parse("PORT").unwrap_or(8080),
            max_upload_size: env_parse("MAX_UPLOAD_SIZE")
                .unwrap_or(10 * 1024 * 1024 * 1024), // 10GB default
            worker_threads: env_parse("WORKER_THREADS").unwrap_or(8),
            cors_origins,
            // several files picked at once are uploaded concurrently
            rate_limit_replenish_ms: env_parse("RATE_LIMIT_REPLENISH_MS").unwrap_or(100),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST").unwrap_or(32),
            tick_interval: tick_interval(),
            grace_period: env_parse("GRACE_PERIOD_MS")
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_GRACE),
            chunk_size: env_parse("CHUNK_SIZE").unwrap_or(CHUNK_SIZE),
            progress_template: std::env::var("PROGRESS_TEMPLATE").ok().map(PathBuf::from),
            shutdown_timeout: env_parse("SHUTDOWN_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(5)),
        }
    }
}

// unset or unparseable values fall back to the default
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

// a zero tick would spin the progress loop, so it falls back to the default
fn tick_interval() -> Duration {
    match env_parse::<u64>("TICK_INTERVAL_MS") {
        Some(0) => {
            tracing::warn!("TICK_INTERVAL_MS must be greater than zero, using {:?}", DEFAULT_TICK);
            DEFAULT_TICK
        }
        Some(ms) => Duration::from_millis(ms),
        None => DEFAULT_TICK,
    }
}
