//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::ServerError;

pub use switchboard_core::metrics::*;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Call once at startup before
/// any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use switchboard_core::memory::MemoryConnection;
    use switchboard_core::{ConnectionRegistry, DeliveryRouter, Payload, PeerId};

    #[test]
    fn render_from_local_recorder() {
        // Local recorder; the global one is installed by the binary.
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(RELAY_DELIVERIES_TOTAL).increment(3);
        });
        let output = render(&handle);
        assert!(output.contains("relay_deliveries_total 3"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn core_delivery_failures_render_under_exported_name() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);

        let registry = Arc::new(ConnectionRegistry::new());
        let _ = registry.register(&PeerId::from("7"), MemoryConnection::detached());
        let report = DeliveryRouter::new(registry).broadcast(&Payload::text("x")).await;
        assert_eq!(report.failed, 1);

        let output = render(&handle);
        assert!(output.contains(&format!("{RELAY_DELIVERY_FAILURES_TOTAL} 1")));
    }
}
