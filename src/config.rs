// src/config.rs

use std::env;
use std::fmt;
use std::time::Duration;

use dotenvy::dotenv;
use url::Url;

/// Minimum score (inclusive) required to pass an exam.
pub const PASSING_SCORE_PERCENTAGE: u8 = 70;

/// Used when the upstream exam carries no duration (30 minutes).
pub const DEFAULT_EXAM_DURATION_SECS: u64 = 1800;

/// Upper bound accepted for an exam duration (24 hours).
pub const MAX_EXAM_DURATION_MINUTES: u64 = 1440;

/// Option count bounds for single-choice questions.
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 5;

/// How often submitted attempts past their retention are evicted.
pub const EVICTION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

const DEFAULT_UPSTREAM_BASE_URL: &str = "https://evaluapp.onrender.com";

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the EvaluApp REST API (exams, questions, results).
    pub upstream_base_url: Url,
    /// Endpoint path that receives submitted results.
    pub results_path: String,
    pub bind_addr: String,
    pub rust_log: String,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// How long a submitted attempt stays readable before it is evicted.
    pub attempt_retention: Duration,
}

/// An environment variable is set but cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}={:?}: {}", self.var, self.value, self.reason)
    }
}

impl std::error::Error for ConfigError {}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream_base_url: Url::parse(DEFAULT_UPSTREAM_BASE_URL)
                .expect("default upstream url must parse"),
            results_path: "/resultados".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
            rust_log: "info".to_string(),
            request_timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(1000),
            retry_max_delay: Duration::from_millis(10_000),
            attempt_retention: Duration::from_secs(3600),
        }
    }
}

impl Config {
    /// Log filter, readable before the rest of the configuration so that
    /// tracing can be installed first.
    pub fn log_filter() -> String {
        dotenv().ok();
        env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
    }

    /// Unset variables fall back to defaults; set but malformed ones are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let default = Self::default();

        let upstream_base_url = match lookup("UPSTREAM_BASE_URL") {
            Some(raw) => Url::parse(&raw).map_err(|e| ConfigError {
                var: "UPSTREAM_BASE_URL",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => default.upstream_base_url,
        };

        let number = |var: &'static str| -> Result<Option<u64>, ConfigError> {
            lookup(var)
                .map(|raw| {
                    raw.trim().parse::<u64>().map_err(|e| ConfigError {
                        var,
                        value: raw.clone(),
                        reason: e.to_string(),
                    })
                })
                .transpose()
        };

        let max_retries = match number("MAX_RETRIES")? {
            Some(n) => u32::try_from(n).map_err(|e| ConfigError {
                var: "MAX_RETRIES",
                value: n.to_string(),
                reason: e.to_string(),
            })?,
            None => default.max_retries,
        };

        Ok(Self {
            upstream_base_url,
            results_path: lookup("RESULTS_PATH").unwrap_or(default.results_path),
            bind_addr: lookup("BIND_ADDR").unwrap_or(default.bind_addr),
            rust_log: lookup("RUST_LOG").unwrap_or(default.rust_log),
            request_timeout: number("REQUEST_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(default.request_timeout),
            max_retries,
            retry_base_delay: number("RETRY_BASE_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(default.retry_base_delay),
            retry_max_delay: number("RETRY_MAX_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(default.retry_max_delay),
            attempt_retention: number("ATTEMPT_RETENTION_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(default.attempt_retention),
        })
    }
}
