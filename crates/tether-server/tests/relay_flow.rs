//! End-to-end tests: real HTTP clients and real executor WebSockets against
//! a server bound to an ephemeral port.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use tether_server::{ServerConfig, ServerHandle, start};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        command_timeout_secs: 1,
        screenshot_timeout_secs: 1,
        control_timeout_secs: 1,
        ..ServerConfig::default()
    }
}

async fn boot() -> ServerHandle {
    start(test_config(), None).await.expect("server starts")
}

/// Connect an executor WebSocket for `user` and announce itself.
async fn connect_executor(port: u16, user: &str) -> WsStream {
    let url = format!("ws://127.0.0.1:{port}/agents?token=demo-token&device=test-rig&user={user}");
    let (mut ws, _resp) = connect_async(&url).await.expect("ws connects");
    let hello = json!({
        "type": "hello",
        "id": "hello-1",
        "hostname": "test-rig",
        "platform": "linux",
        "agentVersion": "0.1.0",
    });
    ws.send(Message::Text(hello.to_string().into()))
        .await
        .expect("hello sent");
    ws
}

/// Wait until `/health` reports `executors` registered connections.
async fn wait_for_executors(port: u16, n: u64) {
    let url = format!("http://127.0.0.1:{port}/health");
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        if let Ok(resp) = reqwest::get(&url).await {
            let body: Value = resp.json().await.unwrap();
            if body["executors"] == json!(n) {
                return;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "executors never reached {n}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Drive an executor that answers every command via `reply`.
fn spawn_executor_loop(
    mut ws: WsStream,
    reply: impl Fn(&Value) -> Option<Value> + Send + 'static,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                let Ok(command) = serde_json::from_str::<Value>(text.as_str()) else {
                    continue;
                };
                if let Some(body) = reply(&command) {
                    if ws.send(Message::Text(body.to_string().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    })
}

async fn post(port: u16, path: &str, user: &str, body: Option<Value>) -> (u16, Value) {
    let client = reqwest::Client::new();
    let mut req = client
        .post(format!("http://127.0.0.1:{port}{path}"))
        .header("x-user-id", user);
    if let Some(body) = body {
        req = req.json(&body);
    }
    let resp = req.send().await.expect("request sent");
    let status = resp.status().as_u16();
    let value: Value = resp.json().await.unwrap_or_else(|_| json!({}));
    (status, value)
}

#[tokio::test]
async fn navigate_round_trip() {
    let server = boot().await;
    let ws = connect_executor(server.port, "u1").await;
    wait_for_executors(server.port, 1).await;

    let _executor = spawn_executor_loop(ws, |command| {
        assert_eq!(command["type"], "navigate");
        assert_eq!(command["payload"]["url"], "https://example.com");
        Some(json!({
            "id": command["id"],
            "type": "status",
            "state": "done",
            "result": {"currentUrl": "https://example.com"},
        }))
    });

    let (status, body) = timeout(
        TIMEOUT,
        post(
            server.port,
            "/api/session/navigate",
            "u1",
            Some(json!({"url": "https://example.com"})),
        ),
    )
    .await
    .expect("navigate completes");

    assert_eq!(status, 200);
    assert_eq!(body["currentUrl"], "https://example.com");
    server.shutdown().await;
}

#[tokio::test]
async fn open_with_no_executor_is_conflict() {
    let server = boot().await;

    let (status, body) = post(server.port, "/api/session/open", "u2", None).await;
    assert_eq!(status, 409);
    assert!(body["error"].as_str().unwrap().contains("no executor online"));
    server.shutdown().await;
}

#[tokio::test]
async fn silent_screenshot_times_out() {
    let server = boot().await;
    let ws = connect_executor(server.port, "u1").await;
    wait_for_executors(server.port, 1).await;

    // Reads commands, never answers.
    let _executor = spawn_executor_loop(ws, |_| None);

    let (status, body) = timeout(
        TIMEOUT,
        post(server.port, "/api/session/screenshot", "u1", None),
    )
    .await
    .expect("screenshot resolves by deadline");

    assert_eq!(status, 504);
    assert!(body["error"].as_str().unwrap().contains("deadline"));
    server.shutdown().await;
}

#[tokio::test]
async fn silent_stop_is_assumed_success() {
    let server = boot().await;
    let ws = connect_executor(server.port, "u1").await;
    wait_for_executors(server.port, 1).await;

    let _executor = spawn_executor_loop(ws, |_| None);

    let (status, body) = timeout(TIMEOUT, post(server.port, "/api/session/stop", "u1", None))
        .await
        .expect("stop resolves by deadline");

    assert_eq!(status, 200);
    assert_eq!(body["stopped"], true);
    assert_eq!(body["assumed"], true);
    server.shutdown().await;
}

#[tokio::test]
async fn event_stream_mirrors_executor_frames() {
    let server = boot().await;
    let mut ws = connect_executor(server.port, "u1").await;
    wait_for_executors(server.port, 1).await;

    let resp = reqwest::get(format!(
        "http://127.0.0.1:{}/api/stream?userId=u1",
        server.port
    ))
    .await
    .expect("stream connects");
    assert_eq!(resp.status().as_u16(), 200);
    assert!(
        resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let mut body_stream = resp.bytes_stream();

    // An arbitrary executor frame, not a reply to anything.
    ws.send(Message::Text(
        json!({"type": "status", "id": "unsolicited", "result": {"tick": 1}})
            .to_string()
            .into(),
    ))
    .await
    .expect("frame sent");

    let mut collected = String::new();
    let found = timeout(TIMEOUT, async {
        while let Some(Ok(chunk)) = body_stream.next().await {
            collected.push_str(&String::from_utf8_lossy(&chunk));
            if collected.contains("unsolicited") {
                return true;
            }
        }
        false
    })
    .await
    .expect("frame mirrored to the stream");

    assert!(found);
    // Reconnect hint sent on connect.
    assert!(collected.contains("retry: 1000"));
    server.shutdown().await;
}

#[tokio::test]
async fn event_stream_is_identity_scoped() {
    let server = boot().await;
    let mut ws = connect_executor(server.port, "u1").await;
    wait_for_executors(server.port, 1).await;

    // Observer for a different identity must stay silent.
    let resp = reqwest::get(format!(
        "http://127.0.0.1:{}/api/stream?userId=other",
        server.port
    ))
    .await
    .unwrap();
    let mut body_stream = resp.bytes_stream();

    ws.send(Message::Text(
        json!({"type": "status", "id": "x", "result": {}}).to_string().into(),
    ))
    .await
    .unwrap();

    let mut collected = String::new();
    let leaked = timeout(Duration::from_millis(500), async {
        while let Some(Ok(chunk)) = body_stream.next().await {
            collected.push_str(&String::from_utf8_lossy(&chunk));
            if collected.contains("\"id\":\"x\"") {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);

    assert!(!leaked, "frame for u1 leaked to another identity's stream");
    server.shutdown().await;
}

#[tokio::test]
async fn executor_disconnect_unregisters_connection() {
    let server = boot().await;
    let mut ws = connect_executor(server.port, "u1").await;
    wait_for_executors(server.port, 1).await;

    ws.close(None).await.expect("clean close");
    wait_for_executors(server.port, 0).await;

    let (status, _body) = post(server.port, "/api/session/open", "u1", None).await;
    assert_eq!(status, 409);
    server.shutdown().await;
}

#[tokio::test]
async fn commands_route_to_connection_before_hello() {
    let server = boot().await;
    // Plain connect, no hello at all: the connection is usable immediately.
    let url = format!(
        "ws://127.0.0.1:{}/agents?token=t&device=quiet&user=u1",
        server.port
    );
    let (ws, _resp) = connect_async(&url).await.expect("ws connects");
    wait_for_executors(server.port, 1).await;

    let _executor = spawn_executor_loop(ws, |command| {
        Some(json!({
            "id": command["id"],
            "type": "status",
            "state": "done",
            "result": {"currentUrl": "about:blank"},
        }))
    });

    let (status, body) = timeout(TIMEOUT, post(server.port, "/api/session/open", "u1", None))
        .await
        .expect("open completes");
    assert_eq!(status, 200);
    assert_eq!(body["currentUrl"], "about:blank");
    server.shutdown().await;
}
