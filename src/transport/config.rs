//! Connection configuration.
//!
//! [`ConnectionConfig`] is what the application supplies once at startup.
//! The root supervisor turns it into a [`TransportConfig`], adding the fixed
//! reconnect and heartbeat settings every broker connection uses.

use std::time::Duration;

use crate::policies::ReconnectPolicy;

/// Delay between reconnect attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Heartbeat interval, both directions.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(4000);

/// Application-supplied connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Broker endpoint (e.g. `https://broker.local/ws`).
    pub endpoint: String,
    /// Emit transport diagnostics through `tracing::debug!`.
    pub verbose_logging: bool,
}

impl ConnectionConfig {
    /// Creates a configuration with verbose logging off.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            verbose_logging: false,
        }
    }

    /// Turns on verbose transport diagnostics.
    pub fn verbose(mut self) -> Self {
        self.verbose_logging = true;
        self
    }
}

/// Settings a transport is constructed with.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Broker endpoint.
    pub endpoint: String,
    /// Verbose diagnostics on/off.
    pub verbose: bool,
    /// Reconnect schedule after an unexpected close.
    pub reconnect: ReconnectPolicy,
    /// Expected interval of broker heartbeats.
    pub heartbeat_incoming: Duration,
    /// Interval of client heartbeats.
    pub heartbeat_outgoing: Duration,
}

impl TransportConfig {
    /// Renders the heartbeats as a STOMP `heart-beat` header value (`out,in` in ms).
    pub fn heartbeat_header(&self) -> String {
        format!(
            "{},{}",
            self.heartbeat_outgoing.as_millis(),
            self.heartbeat_incoming.as_millis()
        )
    }
}

impl From<&ConnectionConfig> for TransportConfig {
    fn from(cfg: &ConnectionConfig) -> Self {
        Self {
            endpoint: cfg.endpoint.clone(),
            verbose: cfg.verbose_logging,
            reconnect: ReconnectPolicy::Fixed(RECONNECT_DELAY),
            heartbeat_incoming: HEARTBEAT_INTERVAL,
            heartbeat_outgoing: HEARTBEAT_INTERVAL,
        }
    }
}
