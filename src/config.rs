//! Server configuration
//!
//! Settings come from compiled defaults overridden by `SSE_*` environment
//! variables:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `SSE_BIND_ADDR` | `127.0.0.1:3030` |
//! | `SSE_STREAM_CAPACITY` | `1024` |
//! | `SSE_SCHEDULER_WORKERS` | `4` |
//! | `SSE_SCHEDULER_QUEUE` | `64` |
//! | `SSE_TICK_PERIOD_MS` | `1000` |
//! | `SSE_SHUTDOWN_TIMEOUT_MS` | `5000` |
//! | `SSE_KEEP_ALIVE_MS` | `15000` |

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::scheduler::SchedulerConfig;

/// Default number of events retained per stream
pub const DEFAULT_STREAM_CAPACITY: usize = 1024;

/// Default interval between keep-alive comments
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Configuration for the `sse-server` process
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    pub bind_addr: SocketAddr,
    /// Maximum retained events per stream
    pub stream_capacity: usize,
    /// Emission scheduler settings
    pub scheduler: SchedulerConfig,
    /// Interval between keep-alive comments on idle stream responses
    pub keep_alive_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3030)),
            stream_capacity: DEFAULT_STREAM_CAPACITY,
            scheduler: SchedulerConfig::default(),
            keep_alive_interval: DEFAULT_KEEP_ALIVE,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let stream_capacity = parse_or(&lookup, "SSE_STREAM_CAPACITY", defaults.stream_capacity)?;
        if stream_capacity == 0 {
            return Err(invalid("SSE_STREAM_CAPACITY", "0", "must be at least 1"));
        }

        let workers = parse_or(&lookup, "SSE_SCHEDULER_WORKERS", defaults.scheduler.workers)?;
        if workers == 0 {
            return Err(invalid("SSE_SCHEDULER_WORKERS", "0", "must be at least 1"));
        }

        let queue_capacity =
            parse_or(&lookup, "SSE_SCHEDULER_QUEUE", defaults.scheduler.queue_capacity)?;
        if queue_capacity == 0 {
            return Err(invalid("SSE_SCHEDULER_QUEUE", "0", "must be at least 1"));
        }

        let period = millis_or(&lookup, "SSE_TICK_PERIOD_MS", defaults.scheduler.period)?;
        if period.is_zero() {
            return Err(invalid("SSE_TICK_PERIOD_MS", "0", "must be positive"));
        }

        let keep_alive_interval =
            millis_or(&lookup, "SSE_KEEP_ALIVE_MS", defaults.keep_alive_interval)?;
        if keep_alive_interval.is_zero() {
            return Err(invalid("SSE_KEEP_ALIVE_MS", "0", "must be positive"));
        }

        Ok(Self {
            bind_addr: parse_or(&lookup, "SSE_BIND_ADDR", defaults.bind_addr)?,
            stream_capacity,
            scheduler: SchedulerConfig {
                workers,
                queue_capacity,
                period,
                shutdown_timeout: millis_or(
                    &lookup,
                    "SSE_SHUTDOWN_TIMEOUT_MS",
                    defaults.scheduler.shutdown_timeout,
                )?,
            },
            keep_alive_interval,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| invalid(key, &raw, &e.to_string())),
        None => Ok(default),
    }
}

fn millis_or<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let default_ms = default.as_millis() as u64;
    parse_or(lookup, key, default_ms).map(Duration::from_millis)
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
