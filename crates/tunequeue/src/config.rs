//! Server configuration.

use std::time::Duration;

use crate::TunequeueError;

/// The only namespace this server admits connections on.
pub const SESSION_NAMESPACE: &str = "/session";

/// Runtime settings for [`TunequeueServer`](crate::TunequeueServer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// Request path clients must connect on.
    pub namespace: String,

    /// How long a new connection has for each opening step: the WebSocket
    /// upgrade, then its handshake frame.
    pub handshake_timeout: Duration,

    /// How long a connection may stay silent before it is closed.
    /// Clients keep it open with heartbeats.
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            namespace: SESSION_NAMESPACE.to_string(),
            handshake_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    /// Reads overrides from the environment:
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `TUNEQUEUE_BIND` | `bind_addr` |
    /// | `TUNEQUEUE_HANDSHAKE_TIMEOUT_SECS` | `handshake_timeout` |
    /// | `TUNEQUEUE_IDLE_TIMEOUT_SECS` | `idle_timeout` |
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    /// [`TunequeueError::Config`] if a timeout is not a whole number of
    /// seconds.
    pub fn from_env() -> Result<Self, TunequeueError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TunequeueError> {
        let mut config = Self::default();

        if let Some(addr) = lookup("TUNEQUEUE_BIND").filter(|v| !v.trim().is_empty()) {
            config.bind_addr = addr.trim().to_string();
        }
        if let Some(secs) = seconds(&lookup, "TUNEQUEUE_HANDSHAKE_TIMEOUT_SECS")? {
            config.handshake_timeout = secs;
        }
        if let Some(secs) = seconds(&lookup, "TUNEQUEUE_IDLE_TIMEOUT_SECS")? {
            config.idle_timeout = secs;
        }

        Ok(config)
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<Duration>, TunequeueError> {
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<u64>()
        .map(|secs| Some(Duration::from_secs(secs)))
        .map_err(|_| TunequeueError::Config { key, value })
}
