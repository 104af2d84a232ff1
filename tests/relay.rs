//! End-to-end tests: REST session lifecycle and the WebSocket relay
//! protocol against a live server on an ephemeral port.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use collab_relay::app_state::AppState;
use collab_relay::client::SyncAgent;
use collab_relay::domain::{SessionId, SessionStore};
use collab_relay::server;
use collab_relay::service::SessionService;
use collab_relay::ws::messages::{MessageKind, WireMessage};
use collab_relay::ws::registry::ConnectionRegistry;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_relay() -> SocketAddr {
    let service = Arc::new(SessionService::new(
        Arc::new(SessionStore::new()),
        Arc::new(ConnectionRegistry::new()),
    ));
    let app = server::app(AppState { service });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn create_session(addr: SocketAddr) -> String {
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/v1/sessions"))
        .send()
        .await
        .expect("create session request");
    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.expect("create session body");
    body["session_id"]
        .as_str()
        .expect("session_id field")
        .to_string()
}

async fn ws_connect(addr: SocketAddr, session_id: &str) -> WsClient {
    let (client, _) = connect_async(format!("ws://{addr}/ws/{session_id}"))
        .await
        .expect("websocket connect");
    // Nagle delays back-to-back small frames behind the peer's delayed ACK,
    // which reorders them past a subsequent connection's handshake.
    if let MaybeTlsStream::Plain(stream) = client.get_ref() {
        stream.set_nodelay(true).expect("set nodelay");
    }
    client
}

async fn recv_json(client: &mut WsClient) -> serde_json::Value {
    let frame = async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str::<serde_json::Value>(&text)
                        .expect("valid json frame");
                }
                Some(Ok(_)) => {}
                other => panic!("connection ended while waiting for frame: {other:?}"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), frame)
        .await
        .expect("timed out waiting for frame")
}

/// Asserts no text frame arrives within the window.
async fn expect_silence(client: &mut WsClient, window: Duration) {
    let frame = async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => return text.to_string(),
                Some(Ok(_)) => {}
                _ => std::future::pending::<()>().await,
            }
        }
    };
    if let Ok(unexpected) = tokio::time::timeout(window, frame).await {
        panic!("expected silence, got frame: {unexpected}");
    }
}

async fn send_json(client: &mut WsClient, raw: &str) {
    client
        .send(Message::text(raw.to_string()))
        .await
        .expect("send frame");
}

#[tokio::test]
async fn health_endpoint_reports_healthy() {
    let addr = spawn_relay().await;

    let response = reqwest::get(format!("http://{addr}/health"))
        .await
        .expect("health request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("health body");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn rest_create_then_fetch_returns_defaults() {
    let addr = spawn_relay().await;
    let id = create_session(addr).await;

    let response = reqwest::get(format!("http://{addr}/api/v1/sessions/{id}"))
        .await
        .expect("fetch request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("fetch body");
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["code"], "# Write your code here\n");
    assert_eq!(body["language"], "python");
    assert_eq!(body["participants"], 0);
}

#[tokio::test]
async fn rest_fetch_unknown_session_is_structured_404() {
    let addr = spawn_relay().await;

    let response = reqwest::get(format!("http://{addr}/api/v1/sessions/nosuchid"))
        .await
        .expect("fetch request");
    assert_eq!(response.status(), 404);
    let body: serde_json::Value = response.json().await.expect("error body");
    assert_eq!(body["error"]["code"], 2001);
}

#[tokio::test]
async fn full_collaboration_scenario() {
    let addr = spawn_relay().await;
    let id = create_session(addr).await;

    // A joins: init snapshot, then presence.
    let mut client_a = ws_connect(addr, &id).await;
    let init_a = recv_json(&mut client_a).await;
    assert_eq!(init_a["type"], "init");
    assert_eq!(init_a["code"], "# Write your code here\n");
    assert_eq!(init_a["language"], "python");
    let presence = recv_json(&mut client_a).await;
    assert_eq!(presence["type"], "participants");
    assert_eq!(presence["count"], 1);

    // B joins: both sides see count 2; B gets the snapshot.
    let mut client_b = ws_connect(addr, &id).await;
    let init_b = recv_json(&mut client_b).await;
    assert_eq!(init_b["type"], "init");
    assert_eq!(init_b["code"], init_a["code"]);
    let presence_b = recv_json(&mut client_b).await;
    assert_eq!(presence_b["count"], 2);
    let presence_a = recv_json(&mut client_a).await;
    assert_eq!(presence_a["count"], 2);

    // A edits: B receives exactly that edit, A gets no echo.
    send_json(&mut client_a, r#"{"type":"code_change","code":"print(1)"}"#).await;
    let edit = recv_json(&mut client_b).await;
    assert_eq!(edit["type"], "code_change");
    assert_eq!(edit["code"], "print(1)");
    expect_silence(&mut client_a, Duration::from_millis(300)).await;

    // B switches language: A receives it.
    send_json(&mut client_b, r#"{"type":"language_change","language":"go"}"#).await;
    let switch = recv_json(&mut client_a).await;
    assert_eq!(switch["type"], "language_change");
    assert_eq!(switch["language"], "go");

    // B leaves: A sees the presence drop.
    client_b.close(None).await.expect("close b");
    let presence_after_leave = recv_json(&mut client_a).await;
    assert_eq!(presence_after_leave["type"], "participants");
    assert_eq!(presence_after_leave["count"], 1);
}

#[tokio::test]
async fn late_joiner_receives_latest_snapshot() {
    let addr = spawn_relay().await;
    let id = create_session(addr).await;

    let mut client_a = ws_connect(addr, &id).await;
    let _ = recv_json(&mut client_a).await; // init
    let _ = recv_json(&mut client_a).await; // participants
    send_json(&mut client_a, r#"{"type":"code_change","code":"edited"}"#).await;
    send_json(&mut client_a, r#"{"type":"language_change","language":"rust"}"#).await;

    let mut client_b = ws_connect(addr, &id).await;
    let init_b = recv_json(&mut client_b).await;
    assert_eq!(init_b["type"], "init");
    assert_eq!(init_b["code"], "edited");
    assert_eq!(init_b["language"], "rust");
}

#[tokio::test]
async fn malformed_frames_are_dropped_and_connection_survives() {
    let addr = spawn_relay().await;
    let id = create_session(addr).await;

    let mut client_a = ws_connect(addr, &id).await;
    let _ = recv_json(&mut client_a).await;
    let _ = recv_json(&mut client_a).await;
    let mut client_b = ws_connect(addr, &id).await;
    let _ = recv_json(&mut client_b).await;
    let _ = recv_json(&mut client_b).await;
    let _ = recv_json(&mut client_a).await; // participants{2}

    send_json(&mut client_a, "not json").await;
    send_json(&mut client_a, r#"{"code":"missing type"}"#).await;
    send_json(&mut client_a, r#"{"type":"warp_drive"}"#).await;
    send_json(&mut client_a, r#"{"type":"code_change","code":7}"#).await;
    expect_silence(&mut client_b, Duration::from_millis(300)).await;

    // The offending connection is still joined and functional.
    send_json(&mut client_a, r#"{"type":"code_change","code":"still here"}"#).await;
    let edit = recv_json(&mut client_b).await;
    assert_eq!(edit["code"], "still here");
}

#[tokio::test]
async fn ws_join_lazily_creates_unknown_session() {
    let addr = spawn_relay().await;

    let mut client = ws_connect(addr, "freshid1").await;
    let init = recv_json(&mut client).await;
    assert_eq!(init["type"], "init");
    assert_eq!(init["code"], "# Write your code here\n");

    let response = reqwest::get(format!("http://{addr}/api/v1/sessions/freshid1"))
        .await
        .expect("fetch request");
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn reconnect_receives_fresh_snapshot_not_stale_state() {
    let addr = spawn_relay().await;
    let id = create_session(addr).await;

    let mut client = ws_connect(addr, &id).await;
    let _ = recv_json(&mut client).await;
    let _ = recv_json(&mut client).await;
    send_json(&mut client, r#"{"type":"code_change","code":"survives"}"#).await;
    client.close(None).await.expect("close");

    let mut reconnected = ws_connect(addr, &id).await;
    let init = recv_json(&mut reconnected).await;
    assert_eq!(init["type"], "init");
    assert_eq!(init["code"], "survives");
    let presence = recv_json(&mut reconnected).await;
    assert_eq!(presence["count"], 1);
}

#[tokio::test]
async fn rest_participant_count_tracks_live_connections() {
    let addr = spawn_relay().await;
    let id = create_session(addr).await;

    let mut client = ws_connect(addr, &id).await;
    let _ = recv_json(&mut client).await;
    let _ = recv_json(&mut client).await;

    let url = format!("http://{addr}/api/v1/sessions/{id}");
    let body: serde_json::Value = reqwest::get(&url)
        .await
        .expect("fetch request")
        .json()
        .await
        .expect("fetch body");
    assert_eq!(body["participants"], 1);

    client.close(None).await.expect("close");

    // The server processes the disconnect asynchronously.
    let mut participants = 1;
    for _ in 0..50 {
        let body: serde_json::Value = reqwest::get(&url)
            .await
            .expect("fetch request")
            .json()
            .await
            .expect("fetch body");
        participants = body["participants"].as_u64().unwrap_or(1);
        if participants == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(participants, 0);
}

#[tokio::test]
async fn cursor_position_is_relayed_without_storage() {
    let addr = spawn_relay().await;
    let id = create_session(addr).await;

    let mut client_a = ws_connect(addr, &id).await;
    let _ = recv_json(&mut client_a).await;
    let _ = recv_json(&mut client_a).await;
    let mut client_b = ws_connect(addr, &id).await;
    let _ = recv_json(&mut client_b).await;
    let _ = recv_json(&mut client_b).await;
    let _ = recv_json(&mut client_a).await;

    send_json(
        &mut client_a,
        r#"{"type":"cursor_position","user_id":"u1","position":{"line":4,"column":2}}"#,
    )
    .await;
    let cursor = recv_json(&mut client_b).await;
    assert_eq!(cursor["type"], "cursor_position");
    assert_eq!(cursor["position"]["line"], 4);

    // The document is untouched by cursor traffic.
    let body: serde_json::Value = reqwest::get(format!("http://{addr}/api/v1/sessions/{id}"))
        .await
        .expect("fetch request")
        .json()
        .await
        .expect("fetch body");
    assert_eq!(body["code"], "# Write your code here\n");
}

#[tokio::test]
async fn sync_agent_round_trip() {
    let addr = spawn_relay().await;
    let id = create_session(addr).await;
    let session_id = SessionId::from_string(id.clone());

    // A raw peer occupies the session first.
    let mut peer = ws_connect(addr, &id).await;
    let _ = recv_json(&mut peer).await;
    let _ = recv_json(&mut peer).await;

    let agent = SyncAgent::connect(&format!("ws://{addr}"), &session_id);
    let (edit_tx, mut edit_rx) = tokio::sync::mpsc::unbounded_channel();
    agent.on(MessageKind::CodeChange, move |message| {
        if let WireMessage::CodeChange { code } = message {
            let _ = edit_tx.send(code.clone());
        }
    });

    // Wait for the agent to finish its handshake.
    for _ in 0..100 {
        if agent.is_connected() && agent.participants() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(agent.is_connected());
    assert_eq!(agent.participants(), 2);
    let _ = recv_json(&mut peer).await; // participants{2}

    // Remote edit reaches the agent's handler.
    send_json(&mut peer, r#"{"type":"code_change","code":"from peer"}"#).await;
    let received = tokio::time::timeout(Duration::from_secs(5), edit_rx.recv())
        .await
        .expect("timed out waiting for edit")
        .expect("handler channel open");
    assert_eq!(received, "from peer");

    // Agent edit reaches the raw peer, with no echo back to the agent.
    agent.send_code_change("from agent".to_string());
    let edit = recv_json(&mut peer).await;
    assert_eq!(edit["code"], "from agent");
    assert!(
        edit_rx.try_recv().is_err(),
        "agent must not observe its own edit"
    );

    agent.close();
}
