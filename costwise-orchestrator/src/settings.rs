use crate::migration::MigrationPolicy;
use anyhow::Context;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.hetzner.cloud/v1";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8003";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// `hetzner` or `mock`.
    pub provider: String,
    pub api_base: String,
    pub listen_addr: SocketAddr,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub policy: MigrationPolicy,
    /// Key the mock provider accepts; any key when unset.
    pub mock_api_key: Option<String>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let secs = |name: &str, default: u64| -> anyhow::Result<Duration> {
            match get(name) {
                Some(v) => v
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{} must be a whole number of seconds, got {:?}", name, v)),
                None => Ok(Duration::from_secs(default)),
            }
        };

        let listen_raw = get("COSTWISE_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_raw
            .parse::<SocketAddr>()
            .with_context(|| format!("COSTWISE_LISTEN_ADDR is not a socket address: {:?}", listen_raw))?;

        let max_poll_attempts = match get("MIGRATION_POLL_ATTEMPTS") {
            Some(v) => v
                .parse::<u32>()
                .with_context(|| format!("MIGRATION_POLL_ATTEMPTS must be a number, got {:?}", v))?,
            None => MigrationPolicy::default().max_poll_attempts,
        };

        Ok(Self {
            provider: get("COSTWISE_PROVIDER")
                .unwrap_or_else(|| "hetzner".to_string())
                .to_lowercase(),
            api_base: get("HCLOUD_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            listen_addr,
            connect_timeout: secs("HCLOUD_CONNECT_TIMEOUT_SECS", 5)?,
            request_timeout: secs("HCLOUD_REQUEST_TIMEOUT_SECS", 20)?,
            policy: MigrationPolicy {
                poll_interval: secs("MIGRATION_POLL_INTERVAL_SECS", 2)?,
                max_poll_attempts,
                settle_delay: secs("MIGRATION_SETTLE_DELAY_SECS", 2)?,
            },
            mock_api_key: get("MOCK_API_KEY"),
        })
    }
}
