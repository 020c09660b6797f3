//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use switchboard_settings::ServerSettings;

/// Runtime configuration for [`SwitchboardServer`](crate::server::SwitchboardServer).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Outbound frames buffered per connection.
    pub send_queue_capacity: usize,
    /// Heartbeat interval in seconds. `0` disables pings.
    pub heartbeat_interval_secs: u64,
    /// Close a connection after this many seconds without inbound traffic.
    pub heartbeat_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Whether signaling sessions announce departures.
    pub announce_signaling_departures: bool,
    /// SSE tick period in milliseconds.
    pub sse_interval_ms: u64,
}

impl ServerConfig {
    /// Heartbeat interval, or `None` when disabled.
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_interval_secs > 0).then(|| Duration::from_secs(self.heartbeat_interval_secs))
    }

    /// Silence allowed before a connection is dropped.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    /// SSE tick period, at least one millisecond.
    pub fn sse_interval(&self) -> Duration {
        Duration::from_millis(self.sse_interval_ms.max(1))
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            send_queue_capacity: 1024,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 60,
            max_message_size: 1024 * 1024,
            announce_signaling_departures: false,
            sse_interval_ms: 1000,
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            send_queue_capacity: s.send_queue_capacity,
            heartbeat_interval_secs: s.heartbeat_interval_secs,
            heartbeat_timeout_secs: s.heartbeat_timeout_secs,
            max_message_size: s.max_message_size,
            announce_signaling_departures: s.announce_signaling_departures,
            sse_interval_ms: s.sse_interval_ms,
        }
    }
}
