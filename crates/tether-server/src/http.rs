//! Client-facing HTTP handlers: session commands and the SSE event stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::Stream;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::relay::SubmitOutcome;
use crate::server::AppState;
use tether_core::errors::RelayError;
use tether_core::ids::Identity;
use tether_core::protocol::{Reply, ReplyMessage};

/// Retry hint sent to SSE clients on connect.
const SSE_RETRY: Duration = Duration::from_secs(1);

/// Identity from the `x-user-id` header, defaulting when absent.
fn identity_from_headers(headers: &HeaderMap) -> Identity {
    Identity::or_default(headers.get("x-user-id").and_then(|v| v.to_str().ok()))
}

/// Body for `POST /api/session/open`.
#[derive(Debug, Default, Deserialize)]
pub struct OpenRequest {
    /// Optional URL to load once the session is up.
    pub url: Option<String>,
}

/// Body for `POST /api/session/navigate`.
#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    /// Target URL.
    pub url: String,
}

/// Query parameters for `GET /api/stream`.
#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    /// Identity whose executor events to mirror.
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Map a relay error to its client-facing response. Every relay failure is a
/// deliberate category; nothing internal leaks past this point.
fn relay_error_response(err: &RelayError) -> Response {
    let status = match err {
        RelayError::NoExecutorOnline { .. } | RelayError::DuplicateCorrelation { .. } => {
            StatusCode::CONFLICT
        }
        RelayError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

/// Map a non-idempotent command outcome: timeouts are gateway timeouts,
/// executor errors pass their text through, status replies carry the result.
fn outcome_response(outcome: SubmitOutcome) -> Response {
    match outcome {
        SubmitOutcome::Reply(ReplyMessage { reply, .. }) => match reply {
            Reply::Status { result, .. } => Json(result.unwrap_or_else(|| json!({}))).into_response(),
            Reply::Pong => Json(json!({})).into_response(),
            Reply::Error { error } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": error })),
            )
                .into_response(),
        },
        SubmitOutcome::TimedOut => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(json!({ "error": "executor did not reply before the deadline" })),
        )
            .into_response(),
    }
}

/// `POST /api/session/open`
pub async fn open_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<OpenRequest>>,
) -> Response {
    let identity = identity_from_headers(&headers);
    let url = body.and_then(|Json(b)| b.url);
    match state.relay.open(&identity, url).await {
        Ok(outcome) => outcome_response(outcome),
        Err(err) => relay_error_response(&err),
    }
}

/// `POST /api/session/navigate`
pub async fn navigate_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NavigateRequest>,
) -> Response {
    let identity = identity_from_headers(&headers);
    match state.relay.navigate(&identity, body.url).await {
        Ok(outcome) => outcome_response(outcome),
        Err(err) => relay_error_response(&err),
    }
}

/// `POST /api/session/screenshot`
pub async fn screenshot_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let identity = identity_from_headers(&headers);
    match state.relay.screenshot(&identity).await {
        Ok(outcome) => outcome_response(outcome),
        Err(err) => relay_error_response(&err),
    }
}

/// `POST /api/session/stop`
///
/// Stop is idempotent from the client's point of view: closing an
/// already-closed or unreachable session is not an error, so a deadline with
/// no reply is surfaced as an assumed success rather than a timeout failure.
pub async fn stop_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let identity = identity_from_headers(&headers);
    match state.relay.stop(&identity).await {
        Ok(SubmitOutcome::Reply(ReplyMessage {
            reply: Reply::Error { error },
            ..
        })) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": error })),
        )
            .into_response(),
        Ok(SubmitOutcome::Reply(_)) => Json(json!({ "stopped": true })).into_response(),
        Ok(SubmitOutcome::TimedOut) => Json(json!({
            "stopped": true,
            "assumed": true,
            "note": "executor did not confirm before the deadline",
        }))
        .into_response(),
        Err(err) => relay_error_response(&err),
    }
}

/// `GET /api/stream` — live SSE mirror of raw executor messages.
///
/// The observer is registered for the duration of the response; dropping the
/// stream (client disconnect) unsubscribes it.
pub async fn event_stream(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let identity = Identity::or_default(params.user_id.as_deref());
    let (observer_id, mut rx) = state.relay.observers().subscribe(identity.clone());
    info!(identity = %identity, observer_id = %observer_id, "observer stream opened");

    let stream = async_stream::stream! {
        // Unsubscribes when the stream is dropped.
        let _guard = ObserverGuard {
            relay: state.relay,
            identity,
            observer_id,
        };
        // Tell the browser how quickly to reconnect after a drop.
        yield Ok(Event::default().retry(SSE_RETRY));
        while let Some(message) = rx.recv().await {
            yield Ok(Event::default().data(message.as_str()));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

struct ObserverGuard {
    relay: std::sync::Arc<crate::relay::RelayService>,
    identity: Identity,
    observer_id: tether_core::ids::ObserverId,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        self.relay
            .observers()
            .unsubscribe(&self.identity, &self.observer_id);
        info!(identity = %self.identity, observer_id = %self.observer_id, "observer stream closed");
    }
}
