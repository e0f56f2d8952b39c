//! Router assembly and server lifecycle.

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::health;
use crate::http;
use crate::relay::RelayService;
use crate::shutdown::ShutdownCoordinator;
use crate::ws;

/// Shared state injected into every handler. The relay (and the registries
/// it owns) is constructed once at startup and torn down with the process —
/// no ambient globals.
#[derive(Clone)]
pub struct AppState {
    /// The relay service owning the three registries.
    pub relay: Arc<RelayService>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Renders the `/metrics` endpoint; `None` disables it (unit tests).
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// State for handler-level tests: no metrics recorder, fresh clock.
    #[cfg(test)]
    pub(crate) fn for_tests(relay: Arc<RelayService>) -> Self {
        Self {
            relay,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics: None,
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/session/open", post(http::open_session))
        .route("/api/session/navigate", post(http::navigate_session))
        .route("/api/session/screenshot", post(http::screenshot_session))
        .route("/api/session/stop", post(http::stop_session))
        .route("/api/stream", get(http::event_stream))
        .route("/agents", get(ws::executor_ws_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Handle returned by [`start`] — keeps the serve task alive and exposes the
/// bound port.
pub struct ServerHandle {
    /// Port the listener bound (useful with `port: 0`).
    pub port: u16,
    /// The relay, for inspection and tests.
    pub relay: Arc<RelayService>,
    shutdown: Arc<ShutdownCoordinator>,
    server: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Initiate a graceful shutdown and wait for the serve task to drain.
    pub async fn shutdown(self) {
        self.shutdown
            .drain(vec![self.server])
            .await;
    }
}

/// Bind and start serving. Returns once the listener is up.
pub async fn start(
    config: ServerConfig,
    metrics: Option<PrometheusHandle>,
) -> Result<ServerHandle, std::io::Error> {
    let relay = Arc::new(RelayService::new(config.clone()));
    let shutdown = Arc::new(ShutdownCoordinator::new());

    let state = AppState {
        relay: Arc::clone(&relay),
        shutdown: Arc::clone(&shutdown),
        start_time: Instant::now(),
        metrics,
    };
    let router = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    info!(port = local_addr.port(), "tether relay listening");

    let token = shutdown.token();
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, router)
            .with_graceful_shutdown(token.cancelled_owned())
            .await;
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        relay,
        shutdown,
        server,
    })
}

/// `GET /health`
async fn health_handler(State(state): State<AppState>) -> Json<health::HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.relay.executors().count(),
        state.relay.observers().count(),
    ))
}

/// `GET /metrics`
async fn metrics_handler(State(state): State<AppState>) -> axum::response::Response {
    match state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (axum::http::StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
