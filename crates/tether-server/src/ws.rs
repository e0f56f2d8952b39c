//! Executor WebSocket gateway.
//!
//! `GET /agents?token=…&device=…&user=…` upgrades to a persistent duplex
//! channel. The connection is registered under its identity immediately on
//! upgrade, before any hello announcement, so a freshly-connected executor
//! may receive a command at once; routing keys on identity, not on handshake
//! completion.

use axum::extract::ws::{Message as WsMessage, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use metrics::counter;
use serde::Deserialize;
use tracing::{info, trace, warn};

use crate::metrics::{WS_EXECUTORS_CONNECTED_TOTAL, WS_EXECUTORS_DISCONNECTED_TOTAL};
use crate::server::AppState;
use tether_core::ids::Identity;

/// Connection parameters carried in the upgrade request query string.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Authentication token. See [`verify_token`].
    pub token: Option<String>,
    /// Device label for logs and diagnostics.
    pub device: Option<String>,
    /// Identity this executor serves.
    pub user: Option<String>,
}

/// Token verification placeholder.
///
/// Executors are currently accepted without validating the token, which is
/// insecure by default. Kept as a single seam so a real verifier can slot in
/// without touching the socket loop.
fn verify_token(token: Option<&str>) -> bool {
    if token.is_none() {
        warn!("executor connected without a token (verification is a no-op)");
    }
    true
}

/// `GET /agents` — executor connection endpoint.
pub async fn executor_ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let _ = verify_token(params.token.as_deref());
    let identity = Identity::or_default(params.user.as_deref());
    let device = params.device.unwrap_or_else(|| "unknown".into());
    ws.on_upgrade(move |socket| handle_executor_socket(socket, state, identity, device))
}

/// Drive one executor connection: register, pump frames, unregister.
async fn handle_executor_socket(
    socket: WebSocket,
    state: AppState,
    identity: Identity,
    device: String,
) {
    let (handle, mut rx) = state
        .relay
        .executors()
        .register(identity.clone(), device.clone());
    counter!(WS_EXECUTORS_CONNECTED_TOTAL).increment(1);
    info!(executor_id = %handle.id, identity = %identity, device = %device, "executor connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let heartbeat = state.relay.config().heartbeat_interval();

    // Writer: drain queued commands and keep the link warm with pings.
    let writer_id = handle.id.clone();
    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat);
        let _ = ping_interval.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                    trace!(executor_id = %writer_id, "ping sent");
                }
            }
        }
    });

    // Reader: feed frames to the dispatcher in arrival order. Dispatch runs
    // inline so per-connection ordering is preserved.
    let relay = state.relay.clone();
    let reader_identity = identity.clone();
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => relay.handle_inbound(&reader_identity, text.as_str()),
                WsMessage::Close(_) => break,
                WsMessage::Pong(_) => trace!("pong received"),
                // axum answers protocol pings itself
                WsMessage::Ping(_) | WsMessage::Binary(_) => {}
            }
        }
    });

    // Either side ending tears the connection down.
    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }

    state.relay.executors().unregister(&identity, &handle.id);
    counter!(WS_EXECUTORS_DISCONNECTED_TOTAL).increment(1);
    info!(executor_id = %handle.id, identity = %identity, "executor disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_token_accepts_anything() {
        assert!(verify_token(Some("demo-token")));
        assert!(verify_token(None));
    }

    #[test]
    fn connect_params_all_optional() {
        let params: ConnectParams = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(params.token.is_none());
        assert!(params.device.is_none());
        assert!(params.user.is_none());
    }
}
