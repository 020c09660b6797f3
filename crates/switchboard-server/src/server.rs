//! `SwitchboardServer`: axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use switchboard_core::{ConnectionRegistry, SessionController, SessionPolicy};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::sse::sse_handler;
use crate::websocket::handler::{chat_handler, signal_handler};

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connections of `/ws/{user_id}` sessions.
    pub chat_registry: Arc<ConnectionRegistry>,
    /// Connections of `/signal` sessions. Never shared with chat.
    pub signaling_registry: Arc<ConnectionRegistry>,
    /// Controller for `/ws/{user_id}` sessions.
    pub chat: SessionController,
    /// Controller for `/signal` sessions.
    pub signaling: SessionController,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Runtime configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The switchboard server.
pub struct SwitchboardServer {
    config: Arc<ServerConfig>,
    chat_registry: Arc<ConnectionRegistry>,
    signaling_registry: Arc<ConnectionRegistry>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl SwitchboardServer {
    /// Create a new server with empty chat and signaling registries.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            chat_registry: Arc::new(ConnectionRegistry::new()),
            signaling_registry: Arc::new(ConnectionRegistry::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics: None,
            start_time: Instant::now(),
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the axum router with all routes.
    pub fn router(&self) -> Router {
        let chat = SessionController::new(Arc::clone(&self.chat_registry), SessionPolicy::chat());
        let signaling = SessionController::new(
            Arc::clone(&self.signaling_registry),
            SessionPolicy::signaling(self.config.announce_signaling_departures),
        );
        let state = AppState {
            chat_registry: Arc::clone(&self.chat_registry),
            signaling_registry: Arc::clone(&self.signaling_registry),
            chat,
            signaling,
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::clone(&self.config),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/ws/{user_id}", get(chat_handler))
            .route("/signal", get(signal_handler))
            .route("/sse-endpoint", get(sse_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port 0) and the serve task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = self.config.bind_addr();
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(source) => return Err(ServerError::Bind { addr, source }),
        };
        let local = listener.local_addr()?;
        let app = self.router();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await;
            if let Err(e) = served {
                error!(error = %e, "server terminated with error");
            }
        });
        info!(addr = %local, "switchboard listening");
        Ok((local, handle))
    }

    /// Connections of chat sessions.
    pub fn chat_registry(&self) -> &Arc<ConnectionRegistry> {
        &self.chat_registry
    }

    /// Connections of signaling sessions.
    pub fn signaling_registry(&self) -> &Arc<ConnectionRegistry> {
        &self.signaling_registry
    }

    /// Open connections across both endpoints.
    pub fn connection_count(&self) -> usize {
        self.chat_registry.connection_count() + self.signaling_registry.connection_count()
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.chat_registry.peer_count() + state.signaling_registry.peer_count(),
        state.chat_registry.connection_count() + state.signaling_registry.connection_count(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}
