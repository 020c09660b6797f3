//! Ping schedule and silence detection.

use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior, interval_at};

use super::connection::WsConnection;

/// Ping cadence and the silence allowed before a connection is dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Time between pings.
    pub interval: Duration,
    /// Inbound silence that closes the connection.
    pub timeout: Duration,
}

impl HeartbeatConfig {
    /// `None` when `interval` is `None`.
    pub fn from_parts(interval: Option<Duration>, timeout: Duration) -> Option<Self> {
        interval.map(|interval| Self { interval, timeout })
    }
}

/// What the writer should do on a heartbeat tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Beat {
    /// Send a ping frame.
    Ping,
    /// The peer has been silent too long.
    TimedOut,
}

/// Per-connection heartbeat clock.
pub struct Heartbeat {
    ticker: Option<(Interval, Duration)>,
}

impl Heartbeat {
    /// Start a clock. The first tick fires one interval from now.
    pub fn new(config: Option<HeartbeatConfig>) -> Self {
        let ticker = config.map(|cfg| {
            let mut ticker = interval_at(tokio::time::Instant::now() + cfg.interval, cfg.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            (ticker, cfg.timeout)
        });
        Self { ticker }
    }

    /// Wait for the next tick and judge `connection`'s liveness.
    ///
    /// Never resolves when the heartbeat is disabled.
    pub async fn tick(&mut self, connection: &WsConnection) -> Beat {
        let Some((ticker, timeout)) = self.ticker.as_mut() else {
            return std::future::pending().await;
        };
        let _ = ticker.tick().await;
        if connection.last_seen_elapsed() > *timeout {
            Beat::TimedOut
        } else {
            Beat::Ping
        }
    }
}
