//! Service configuration.
//!
//! One immutable struct, built once at startup and passed explicitly into
//! each component constructor. No ambient globals.

use std::time::Duration;

/// Capture service configuration.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max request body size
    pub max_body_size: usize,

    /// Prefix for archive storage URLs, e.g. `s3://captures/jobs/`
    pub storage_prefix: String,
    /// Whether workers run headless; non-headless profiles disable the
    /// browser cache via worker env
    pub headless: bool,

    /// Age after which a finished job becomes eligible for reclamation
    pub retention: Duration,
    /// Interval between reaper sweeps (in-process trigger)
    pub reap_interval: Duration,
    /// Whether the in-process reaper loop runs at all
    pub reaper_enabled: bool,

    /// Regex allow-list for URLs accepted over the relay
    pub allowed_capture_patterns: Vec<String>,
    /// Sleep between a client keep-alive and the next worker poll
    pub poll_interval: Duration,
    /// Consecutive poll failures tolerated before the relay gives up
    pub max_poll_failures: u32,
    /// How long the relay waits for the client to send its target URL
    pub await_url_timeout: Duration,

    /// Port of the per-job worker status endpoint
    pub worker_port: u16,
    /// Timeout for worker status/download requests
    pub worker_timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            max_body_size: 1024 * 1024, // 1MB
            storage_prefix: "s3://captures/jobs/".to_string(),
            headless: true,
            retention: Duration::from_secs(3600),
            reap_interval: Duration::from_secs(300),
            reaper_enabled: true,
            allowed_capture_patterns: vec!["^https?://".to_string()],
            poll_interval: Duration::from_secs(3),
            max_poll_failures: 3,
            await_url_timeout: Duration::from_secs(30),
            worker_port: 3000,
            worker_timeout: Duration::from_secs(10),
        }
    }
}

impl CaptureConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT").unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_body_size: env_parse("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            storage_prefix: std::env::var("STORAGE_PREFIX").unwrap_or(defaults.storage_prefix),
            headless: std::env::var("HEADLESS")
                .map(|v| v != "0" && v.to_lowercase() != "false")
                .unwrap_or(defaults.headless),
            retention: env_parse("JOB_RETENTION_MINS")
                .map(|mins: u64| Duration::from_secs(mins * 60))
                .unwrap_or(defaults.retention),
            reap_interval: env_parse("REAP_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.reap_interval),
            reaper_enabled: std::env::var("REAPER_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.reaper_enabled),
            allowed_capture_patterns: std::env::var("ALLOWED_CAPTURE_PATTERNS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.allowed_capture_patterns),
            poll_interval: env_parse("RELAY_POLL_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            max_poll_failures: env_parse("RELAY_MAX_POLL_FAILURES")
                .unwrap_or(defaults.max_poll_failures),
            await_url_timeout: env_parse("RELAY_URL_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.await_url_timeout),
            worker_port: env_parse("WORKER_PORT").unwrap_or(defaults.worker_port),
            worker_timeout: env_parse("WORKER_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.worker_timeout),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
