//! Metric names recorded by the core and by transports.

/// Connections opened (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Connections closed (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Open connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Connection lifetime (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Frames refused by a full or closed send queue (counter).
pub const WS_DROPPED_FRAMES_TOTAL: &str = "ws_dropped_frames_total";
/// Connections dropped by the heartbeat (counter).
pub const WS_HEARTBEAT_TIMEOUTS_TOTAL: &str = "ws_heartbeat_timeouts_total";
/// Successful relay writes (counter).
pub const RELAY_DELIVERIES_TOTAL: &str = "relay_deliveries_total";
/// Failed relay writes (counter).
pub const RELAY_DELIVERY_FAILURES_TOTAL: &str = "relay_delivery_failures_total";
/// Peers whose last connection closed (counter).
pub const PRESENCE_DEPARTURES_TOTAL: &str = "presence_departures_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_CONNECTION_DURATION_SECONDS,
            WS_DROPPED_FRAMES_TOTAL,
            WS_HEARTBEAT_TIMEOUTS_TOTAL,
            RELAY_DELIVERIES_TOTAL,
            RELAY_DELIVERY_FAILURES_TOTAL,
            PRESENCE_DEPARTURES_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
