use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::analytics::CohortAlignment;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    /// DuckDB size string such as `"1GB"` or `"512MB"`.
    pub duckdb_memory_limit: String,
    pub cors_origins: Vec<String>,
    /// Per-subscriber live-feed queue capacity.
    pub live_buffer: usize,
    pub live_send_timeout_ms: u64,
    pub heartbeat_timeout_secs: u64,
    pub heartbeat_sweep_secs: u64,
    pub cohort_alignment: CohortAlignment,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: env_or("EVENTSCOPE_PORT", 3000)?,
            data_dir: std::env::var("EVENTSCOPE_DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string()),
            duckdb_memory_limit: std::env::var("EVENTSCOPE_DUCKDB_MEMORY")
                .unwrap_or_else(|_| "1GB".to_string()),
            cors_origins: std::env::var("EVENTSCOPE_CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            live_buffer: non_zero("EVENTSCOPE_LIVE_BUFFER", env_or("EVENTSCOPE_LIVE_BUFFER", 64)?)?,
            live_send_timeout_ms: non_zero(
                "EVENTSCOPE_LIVE_SEND_TIMEOUT_MS",
                env_or("EVENTSCOPE_LIVE_SEND_TIMEOUT_MS", 2000)?,
            )?,
            heartbeat_timeout_secs: non_zero(
                "EVENTSCOPE_HEARTBEAT_TIMEOUT_SECS",
                env_or("EVENTSCOPE_HEARTBEAT_TIMEOUT_SECS", 90)?,
            )?,
            heartbeat_sweep_secs: non_zero(
                "EVENTSCOPE_HEARTBEAT_SWEEP_SECS",
                env_or("EVENTSCOPE_HEARTBEAT_SWEEP_SECS", 15)?,
            )?,
            cohort_alignment: {
                let raw = std::env::var("EVENTSCOPE_COHORT_ALIGNMENT")
                    .unwrap_or_else(|_| "window".to_string());
                CohortAlignment::parse(Some(&raw)).map_err(|e| e.to_string())?
            },
        })
    }

    pub fn live_send_timeout(&self) -> Duration {
        Duration::from_millis(self.live_send_timeout_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn heartbeat_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_sweep_secs.max(1))
    }
}

fn env_or<T>(name: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    parse_or(name, std::env::var(name).ok(), default)
}

/// Parse a set variable, falling back to `default` only when it is unset.
fn parse_or<T>(name: &str, raw: Option<String>, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| format!("invalid {name}={raw:?}: {e}")),
    }
}

fn non_zero<T: Default + PartialEq>(name: &str, value: T) -> Result<T, String> {
    if value == T::default() {
        Err(format!("{name} must be at least 1"))
    } else {
        Ok(value)
    }
}
