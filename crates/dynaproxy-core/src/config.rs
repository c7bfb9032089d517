//! Configuration management for dynaproxy.
//!
//! All configuration is driven by environment variables.

use std::time::Duration;

use crate::error::{CoreError, CoreResult};

/// Candidate listen ports tried when `DYNAPROXY_PORTS` is unset.
pub const DEFAULT_PORTS: &[u16] = &[12333, 12334];

/// Deadline for reading a request (headers and body).
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for producing and writing a response.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Global configuration for dynaproxy.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Ordered candidate listen ports; the first free one is used.
    pub ports: Vec<u16>,
    /// Interface the listener binds to.
    pub bind_host: String,
    /// Endpoint of the table store that requests are relayed to.
    pub backend_url: String,
    /// Timeout for a single backend round trip.
    pub backend_timeout: Duration,
    /// Whether the table-deletion routes are installed.
    pub enable_delete_table: bool,
    /// Default number of DescribeTable polls for `/StatusTable/`.
    pub status_poll_tries: u32,
    /// Delay between two `/StatusTable/` polls.
    pub status_poll_interval: Duration,
    /// Log level.
    pub log_level: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            ports: DEFAULT_PORTS.to_vec(),
            bind_host: "0.0.0.0".to_owned(),
            backend_url: "http://localhost:8000".to_owned(),
            backend_timeout: Duration::from_secs(30),
            enable_delete_table: false,
            status_poll_tries: 20,
            status_poll_interval: Duration::from_millis(1000),
            log_level: "info".to_owned(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration from environment variables.
    ///
    /// Unparseable values keep their defaults and are reported with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("DYNAPROXY_PORTS") {
            match parse_port_list(&v) {
                Ok(ports) => config.ports = ports,
                Err(e) => tracing::warn!(error = %e, "ignoring DYNAPROXY_PORTS"),
            }
        }
        if let Ok(v) = std::env::var("DYNAPROXY_BIND_HOST") {
            config.bind_host = v;
        }
        if let Ok(v) = std::env::var("DYNAPROXY_BACKEND_URL") {
            config.backend_url = v.trim_end_matches('/').to_owned();
        }
        if let Some(secs) = env_parse::<u64>("DYNAPROXY_BACKEND_TIMEOUT_SECS") {
            config.backend_timeout = Duration::from_secs(secs);
        }
        if let Ok(v) = std::env::var("DYNAPROXY_ENABLE_DELETE_TABLE") {
            config.enable_delete_table = is_truthy(&v);
        }
        if let Some(tries) = env_parse::<u32>("DYNAPROXY_STATUS_POLL_TRIES") {
            config.status_poll_tries = tries.max(1);
        }
        if let Some(ms) = env_parse::<u64>("DYNAPROXY_STATUS_POLL_INTERVAL_MS") {
            config.status_poll_interval = Duration::from_millis(ms);
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }
}

/// Parse a comma-separated list of candidate ports, preserving order.
pub fn parse_port_list(raw: &str) -> CoreResult<Vec<u16>> {
    let ports = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| CoreError::Config(format!("invalid port '{s}'")))
        })
        .collect::<CoreResult<Vec<_>>>()?;

    if ports.is_empty() {
        return Err(CoreError::Config("empty port list".to_owned()));
    }
    Ok(ports)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable value");
            None
        }
    }
}

fn is_truthy(v: &str) -> bool {
    matches!(v, "1" | "true" | "yes" | "TRUE" | "YES")
}
