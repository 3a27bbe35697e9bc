//! End-to-end tests: a real server on an ephemeral port, driven by
//! WebSocket clients holding real HS256 tokens.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use realm::prelude::*;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

type Ws = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const SECRET: &str = "realm_integration_test_secret_long_enough";
const WAIT: Duration = Duration::from_secs(3);

// =========================================================================
// Helpers
// =========================================================================

async fn start(config: PresenceConfig) -> (String, AdminTrigger) {
    let server = RealmServer::builder()
        .bind("127.0.0.1:0")
        .presence_config(config)
        .build(JwtVerifier::new(SECRET).unwrap())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let admin = server.admin();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    (addr, admin)
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

fn token_with_exp(user_id: u64, username: &str, exp: i64) -> String {
    let claims = TokenClaims {
        user_id,
        username: username.into(),
        role: Role::User,
        iat: now(),
        exp,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn token(user_id: u64, username: &str) -> String {
    token_with_exp(user_id, username, now() + 3600)
}

/// Connects and consumes the `players_count` every new connection gets.
async fn connect(addr: &str) -> (Ws, u64) {
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .unwrap();
    let count = expect_event(&mut ws, "players_count").await;
    (ws, count.as_u64().unwrap())
}

async fn send(ws: &mut Ws, frame: Value) {
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
}

/// Reads frames until one named `event` arrives; returns its `data`.
async fn expect_event(ws: &mut Ws, event: &str) -> Value {
    let read = async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let frame: Value = serde_json::from_str(&text).unwrap();
                    if frame["event"] == event {
                        return frame["data"].clone();
                    }
                }
                Some(Ok(_)) => continue,
                other => panic!("connection ended waiting for {event}: {other:?}"),
            }
        }
    };
    tokio::time::timeout(WAIT, read)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {event}"))
}

/// Reads until the server closes the socket. Returns every event name
/// seen on the way.
async fn expect_closed(ws: &mut Ws) -> Vec<String> {
    let read = async {
        let mut seen = Vec::new();
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let frame: Value = serde_json::from_str(&text).unwrap();
                    seen.push(frame["event"].as_str().unwrap_or_default().to_string());
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return seen,
                Some(Ok(_)) => continue,
            }
        }
    };
    tokio::time::timeout(WAIT, read)
        .await
        .expect("server did not close the connection")
}

async fn login(ws: &mut Ws, user_id: u64, username: &str) {
    send(ws, json!({ "event": "authenticate", "data": token(user_id, username) })).await;
    let data = expect_event(ws, "auth_success").await;
    assert_eq!(data["username"], username);
}

// =========================================================================
// Scenarios
// =========================================================================

#[tokio::test]
async fn test_first_login_broadcasts_count_and_notification() {
    let (addr, admin) = start(PresenceConfig::default()).await;
    let (mut a, initial) = connect(&addr).await;
    assert_eq!(initial, 0);
    let (mut b, _) = connect(&addr).await;

    login(&mut a, 1, "aria").await;

    let notice = expect_event(&mut b, "login_notification").await;
    assert_eq!(notice["username"], "aria");
    assert!(notice["timestamp"].is_string());
    assert_eq!(expect_event(&mut b, "players_count").await, 1);
    assert_eq!(expect_event(&mut a, "players_count").await, 1);

    let (_c, count) = connect(&addr).await;
    assert_eq!(count, 1);
    assert_eq!(admin.players_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_wrapped_token_payload_is_accepted() {
    let (addr, _admin) = start(PresenceConfig::default()).await;
    let (mut a, _) = connect(&addr).await;

    send(
        &mut a,
        json!({ "event": "authenticate", "data": { "token": token(5, "cato") } }),
    )
    .await;

    assert_eq!(expect_event(&mut a, "auth_success").await["username"], "cato");
}

#[tokio::test]
async fn test_second_connection_same_user_closes_first_without_double_count() {
    let (addr, admin) = start(PresenceConfig::default()).await;
    let (mut first, _) = connect(&addr).await;
    login(&mut first, 1, "aria").await;

    let (mut second, count) = connect(&addr).await;
    assert_eq!(count, 1);
    login(&mut second, 1, "aria").await;

    let seen = expect_closed(&mut first).await;
    assert!(!seen.iter().any(|e| e == "logout_notification"));
    assert_eq!(expect_event(&mut second, "players_count").await, 1);

    // Let the evicted handler's disconnect report land.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(admin.players_count().await.unwrap(), 1);
    let online = admin.online_players().await.unwrap();
    assert_eq!(online.len(), 1);
    assert_eq!(online[0].username, "aria");
}

#[tokio::test]
async fn test_expired_token_gets_auth_error_and_connection_stays_open() {
    let (addr, admin) = start(PresenceConfig::default()).await;
    let (mut a, _) = connect(&addr).await;

    send(
        &mut a,
        json!({ "event": "authenticate", "data": token_with_exp(1, "aria", now() - 60) }),
    )
    .await;

    let err = expect_event(&mut a, "auth_error").await;
    assert!(err["message"].as_str().unwrap().contains("expired"));

    send(&mut a, json!({ "event": "ping", "data": 42 })).await;
    assert_eq!(expect_event(&mut a, "pong").await, 42);
    assert_eq!(admin.players_count().await.unwrap(), 0);

    // A retry on the same connection works.
    login(&mut a, 1, "aria").await;
    assert_eq!(admin.players_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_non_string_token_gets_auth_error_and_retry_works() {
    let (addr, admin) = start(PresenceConfig::default()).await;
    let (mut a, _) = connect(&addr).await;

    send(&mut a, json!({ "event": "authenticate", "data": { "token": 123 } })).await;

    let err = expect_event(&mut a, "auth_error").await;
    assert!(err["message"].as_str().unwrap().contains("malformed"));
    assert_eq!(admin.players_count().await.unwrap(), 0);

    login(&mut a, 1, "aria").await;
    assert_eq!(admin.players_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_second_identity_on_same_connection_is_refused() {
    let (addr, admin) = start(PresenceConfig::default()).await;
    let (mut a, _) = connect(&addr).await;
    login(&mut a, 1, "aria").await;

    send(&mut a, json!({ "event": "authenticate", "data": token(2, "bram") })).await;

    let err = expect_event(&mut a, "auth_error").await;
    assert!(err["message"].as_str().unwrap().contains("already authenticated"));
    let online = admin.online_players().await.unwrap();
    assert_eq!(online.len(), 1);
    assert_eq!(online[0].username, "aria");
}

#[tokio::test]
async fn test_missing_token_gets_auth_error() {
    let (addr, _admin) = start(PresenceConfig::default()).await;
    let (mut a, _) = connect(&addr).await;

    send(&mut a, json!({ "event": "authenticate", "data": null })).await;

    let err = expect_event(&mut a, "auth_error").await;
    assert!(err["message"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_idle_connection_is_reaped_and_others_notified() {
    let config = PresenceConfig {
        idle_threshold: Duration::from_millis(800),
        reaper: ReaperConfig::with_interval(Duration::from_secs(1)),
    };
    let (addr, admin) = start(config).await;
    let (mut idle, _) = connect(&addr).await;
    let (mut busy, _) = connect(&addr).await;
    login(&mut idle, 1, "aria").await;
    login(&mut busy, 2, "bram").await;

    let keep_alive = tokio::spawn(async move {
        for i in 0..15 {
            send(&mut busy, json!({ "event": "ping", "data": i })).await;
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        busy
    });

    expect_closed(&mut idle).await;
    let mut busy = keep_alive.await.unwrap();

    let notice = expect_event(&mut busy, "logout_notification").await;
    assert_eq!(notice["username"], "aria");
    assert_eq!(admin.players_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_admin_disconnect_all_closes_everyone() {
    let (addr, admin) = start(PresenceConfig::default()).await;
    let mut clients = Vec::new();
    for (id, name) in [(1, "aria"), (2, "bram"), (3, "cato")] {
        let (mut ws, _) = connect(&addr).await;
        login(&mut ws, id, name).await;
        clients.push(ws);
    }
    assert_eq!(admin.players_count().await.unwrap(), 3);

    let report = admin.disconnect_all().await.unwrap();
    assert_eq!(report.disconnected, 3);

    for ws in &mut clients {
        let seen = expect_closed(ws).await;
        assert_eq!(seen.iter().filter(|e| *e == "mass_disconnect").count(), 1);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(admin.players_count().await.unwrap(), 0);
    assert!(admin.online_players().await.unwrap().is_empty());

    // New connections start from zero.
    let (_ws, count) = connect(&addr).await;
    assert_eq!(count, 0);
}

// =========================================================================
// Messages and edge cases
// =========================================================================

#[tokio::test]
async fn test_invalid_frame_gets_error_and_connection_stays_open() {
    let (addr, _admin) = start(PresenceConfig::default()).await;
    let (mut a, _) = connect(&addr).await;

    a.send(Message::Text("{not json".into())).await.unwrap();
    let err = expect_event(&mut a, "error").await;
    assert!(err["message"].as_str().unwrap().contains("invalid frame"));

    send(&mut a, json!({ "event": "fly_to_moon", "data": 1 })).await;
    expect_event(&mut a, "error").await;

    send(&mut a, json!({ "event": "ping", "data": 7 })).await;
    assert_eq!(expect_event(&mut a, "pong").await, 7);
}

#[tokio::test]
async fn test_chat_requires_authentication_and_reaches_everyone() {
    let (addr, _admin) = start(PresenceConfig::default()).await;
    let (mut a, _) = connect(&addr).await;
    let (mut b, _) = connect(&addr).await;

    send(&mut a, json!({ "event": "chat_message", "data": { "message": "hi" } })).await;
    let err = expect_event(&mut a, "error").await;
    assert_eq!(err["message"], "not authenticated");

    login(&mut a, 1, "aria").await;
    send(&mut a, json!({ "event": "chat_message", "data": { "message": "hi" } })).await;

    let line = expect_event(&mut b, "chat_message").await;
    assert_eq!(line["username"], "aria");
    assert_eq!(line["message"], "hi");
}

#[tokio::test]
async fn test_activity_is_rebroadcast_with_timestamp() {
    let (addr, _admin) = start(PresenceConfig::default()).await;
    let (mut a, _) = connect(&addr).await;
    let (mut b, _) = connect(&addr).await;
    login(&mut a, 1, "aria").await;

    send(
        &mut a,
        json!({ "event": "activity", "data": { "message": "found a sword", "type": "loot" } }),
    )
    .await;

    let item = expect_event(&mut b, "activity").await;
    assert_eq!(item["message"], "found a sword");
    assert_eq!(item["type"], "loot");
    assert!(item["timestamp"].is_string());
}

#[tokio::test]
async fn test_client_disconnect_event_logs_user_out() {
    let (addr, admin) = start(PresenceConfig::default()).await;
    let (mut a, _) = connect(&addr).await;
    let (mut b, _) = connect(&addr).await;
    login(&mut a, 1, "aria").await;
    login(&mut b, 2, "bram").await;

    send(&mut a, json!({ "event": "disconnect", "data": { "reason": "bye" } })).await;
    expect_closed(&mut a).await;

    let notice = expect_event(&mut b, "logout_notification").await;
    assert_eq!(notice["username"], "aria");
    assert_eq!(expect_event(&mut b, "players_count").await, 1);
    assert_eq!(admin.players_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_dropped_socket_logs_user_out() {
    let (addr, admin) = start(PresenceConfig::default()).await;
    let (mut a, _) = connect(&addr).await;
    let (mut b, _) = connect(&addr).await;
    login(&mut a, 1, "aria").await;
    drop(a);

    let notice = expect_event(&mut b, "logout_notification").await;
    assert_eq!(notice["username"], "aria");
    assert_eq!(admin.players_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_system_message_reaches_unauthenticated_clients() {
    let (addr, admin) = start(PresenceConfig::default()).await;
    let (mut a, _) = connect(&addr).await;

    let delivered = admin
        .broadcast("restart in 5 minutes", SystemMessageKind::Warning)
        .await
        .unwrap();
    assert_eq!(delivered, 1);

    let notice = expect_event(&mut a, "system_message").await;
    assert_eq!(notice["message"], "restart in 5 minutes");
    assert_eq!(notice["type"], "warning");
}

#[tokio::test]
async fn test_run_until_shutdown_closes_connections() {
    let server = RealmServer::builder()
        .bind("127.0.0.1:0")
        .build(JwtVerifier::new(SECRET).unwrap())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let presence = server.presence();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let task = tokio::spawn(server.run_until(async {
        let _ = stop_rx.await;
    }));

    let (mut a, _) = connect(&addr).await;
    login(&mut a, 1, "aria").await;

    stop_tx.send(()).unwrap();
    expect_closed(&mut a).await;
    task.await.unwrap().unwrap();
    assert!(presence.is_closed());
}
