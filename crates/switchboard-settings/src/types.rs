//! Settings types. JSON keys are camelCase; every field has a default so a
//! partial file is always valid.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SwitchboardSettings {
    /// Network and relay behaviour.
    pub server: ServerSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl SwitchboardSettings {
    /// Reject combinations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let s = &self.server;
        if s.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueCapacity must be at least 1".into(),
            ));
        }
        if s.max_message_size == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxMessageSize must be at least 1".into(),
            ));
        }
        if s.sse_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sseIntervalMs must be at least 1".into(),
            ));
        }
        if s.heartbeat_interval_secs > 0 && s.heartbeat_timeout_secs < s.heartbeat_interval_secs {
            return Err(SettingsError::InvalidValue(format!(
                "server.heartbeatTimeoutSecs ({}) is shorter than heartbeatIntervalSecs ({})",
                s.heartbeat_timeout_secs, s.heartbeat_interval_secs
            )));
        }
        Ok(())
    }
}

/// Server network and relay settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port. `0` picks an ephemeral port.
    pub port: u16,
    /// Outbound frames buffered per connection before writes fail.
    pub send_queue_capacity: usize,
    /// Seconds between server pings. `0` disables the heartbeat.
    pub heartbeat_interval_secs: u64,
    /// Seconds without any inbound traffic before a connection is dropped.
    pub heartbeat_timeout_secs: u64,
    /// Largest inbound WebSocket message accepted, in bytes.
    pub max_message_size: usize,
    /// Broadcast presence when a signaling peer's last connection closes.
    pub announce_signaling_departures: bool,
    /// Milliseconds between SSE ticks.
    pub sse_interval_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            send_queue_capacity: 1024,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 60,
            max_message_size: 1 << 20,
            announce_signaling_departures: false,
            sse_interval_ms: 1000,
        }
    }
}

/// Log verbosity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level (most verbose).
    Trace,
    /// Debug-level.
    Debug,
    /// Info-level (default).
    #[default]
    Info,
    /// Warning-level.
    Warn,
    /// Error-level.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level when `RUST_LOG` is not set.
    pub level: LogLevel,
    /// Emit newline-delimited JSON instead of compact text.
    pub json: bool,
}
