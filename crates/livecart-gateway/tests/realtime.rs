// End-to-end checks against a real listener: HTTP writes in, websocket
// frames out.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use livecart_core::config::{LivecartConfig, RealtimeConfig};
use livecart_core::types::ChatMessage;
use livecart_gateway::app::{build_router, AppState};
use livecart_store::SqliteRepository;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const ADMIN_TOKEN: &str = "admin-secret";

struct TestServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    http: reqwest::Client,
}

impl TestServer {
    async fn start(realtime: RealtimeConfig) -> Self {
        let mut config = LivecartConfig::default();
        config.realtime = realtime;
        config.gateway.admin_token = Some(ADMIN_TOKEN.to_string());

        let repo = Arc::new(SqliteRepository::open_in_memory().unwrap());
        let state = Arc::new(AppState::new(config, repo));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = build_router(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            addr,
            state,
            http: reqwest::Client::new(),
        }
    }

    async fn default() -> Self {
        Self::start(RealtimeConfig::default()).await
    }

    async fn connect(&self, query: &str) -> Ws {
        let url = format!("ws://{}/ws{}", self.addr, query);
        let (ws, _) = connect_async(url).await.unwrap();
        ws
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.http
            .post(format!("http://{}{}", self.addr, path))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn wait_for_clients(&self, n: usize) {
        for _ in 0..300 {
            if self.state.hub.client_count() == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {n} clients, hub has {}",
            self.state.hub.client_count()
        );
    }
}

/// Next text frame as JSON; heartbeats are skipped.
async fn next_json(ws: &mut Ws) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(3), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Next event of `kind`, skipping viewer counts and anything else.
async fn next_of_kind(ws: &mut Ws, kind: &str) -> Value {
    loop {
        let event = next_json(ws).await;
        if event["type"] == kind {
            return event;
        }
    }
}

/// Read until the server's close frame and return its status code.
async fn close_code(ws: &mut Ws) -> u16 {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for close");
        match msg {
            Some(Ok(Message::Close(Some(frame)))) => return u16::from(frame.code),
            Some(Ok(Message::Close(None))) => panic!("close frame without status"),
            Some(Ok(_)) => continue,
            Some(Err(e)) => panic!("connection failed before close frame: {e}"),
            None => panic!("stream ended before close frame"),
        }
    }
}

/// Restrict the socket to `kinds` and wait until the server has applied it.
/// The pong proves every earlier control message was processed.
async fn subscribe(ws: &mut Ws, kinds: &[&str]) {
    ws.send(Message::Text(
        json!({"type": "subscribe", "kinds": kinds}).to_string().into(),
    ))
    .await
    .unwrap();
    ws.send(Message::Text(json!({"type": "ping", "seq": 77}).to_string().into()))
        .await
        .unwrap();
    loop {
        let frame = next_json(ws).await;
        if frame["type"] == "pong" {
            assert_eq!(frame["seq"], 77);
            return;
        }
    }
}

#[tokio::test]
async fn chat_broadcast_reaches_every_viewer() {
    let server = TestServer::default().await;
    let mut a = server.connect("").await;
    let mut b = server.connect("").await;
    server.wait_for_clients(2).await;

    let resp = server
        .post(
            "/api/chat",
            json!({"username": "u", "message": "hello", "emoji": ""}),
        )
        .await;
    assert_eq!(resp.status(), 201);

    let ea = next_of_kind(&mut a, "chat_message").await;
    let eb = next_of_kind(&mut b, "chat_message").await;
    assert_eq!(ea["message"], "hello");
    assert_eq!(ea["seq"], eb["seq"]);
    assert_eq!(ea["ts"], eb["ts"]);
    assert_eq!(ea["id"], eb["id"]);
}

#[tokio::test]
async fn order_composes_chat_line() {
    let server = TestServer::default().await;
    let mut admin = server.connect(&format!("?admin={ADMIN_TOKEN}")).await;
    server.wait_for_clients(1).await;

    let resp = server
        .post(
            "/api/orders",
            json!({"customer_id": "10299", "size": "OneSize", "quantity": 1, "price": 12.90}),
        )
        .await;
    assert_eq!(resp.status(), 201);

    let order = next_of_kind(&mut admin, "new_order").await;
    let chat = next_json(&mut admin).await;
    let k = order["seq"].as_u64().unwrap();
    assert_eq!(chat["type"], "chat_message");
    assert_eq!(chat["seq"].as_u64().unwrap(), k + 1);
    assert_eq!(chat["username"], "System");
    assert_eq!(chat["emoji"], "");
    assert_eq!(chat["message"], "**Bestellung** 0299 I 1x I 12,90 I OneSize");
    assert_eq!(order["customer_id"], "10299");
    assert_eq!(order["price"], 12.9);
}

#[tokio::test]
async fn slow_consumer_is_closed_with_1011() {
    let server = TestServer::default().await;
    let mut slow = server.connect("").await;
    server.wait_for_clients(1).await;

    // a synchronous burst: no pump runs until it is over, so the queue overflows
    let overflow = server.state.config.realtime.queue_capacity + 36;
    for n in 0..overflow {
        server.state.publisher.publish_chat(&ChatMessage {
            id: format!("m{n}"),
            username: "u".into(),
            message: format!("burst {n}"),
            emoji: String::new(),
            created_at: "2024-09-15T18:03:22.412Z".into(),
        });
    }

    assert_eq!(close_code(&mut slow).await, 1011);
    server.wait_for_clients(0).await;
}

#[tokio::test]
async fn late_joiner_misses_history() {
    let server = TestServer::default().await;
    for n in 0..10 {
        let resp = server
            .post("/api/chat", json!({"username": "u", "message": format!("early {n}")}))
            .await;
        assert_eq!(resp.status(), 201);
    }

    let mut late = server.connect("").await;
    server.wait_for_clients(1).await;
    subscribe(&mut late, &["chat_message"]).await;

    server
        .post("/api/chat", json!({"username": "u", "message": "last"}))
        .await;

    let event = next_json(&mut late).await;
    assert_eq!(event["type"], "chat_message");
    assert_eq!(event["message"], "last");

    let more = tokio::time::timeout(Duration::from_millis(300), late.next()).await;
    assert!(more.is_err(), "late joiner received more than one event");
}

#[tokio::test]
async fn viewer_count_is_debounced() {
    let server = TestServer::default().await;
    let mut observer = server.connect("").await;
    server.wait_for_clients(1).await;
    subscribe(&mut observer, &["viewer_count"]).await;

    let joins = (0..49).map(|_| server.connect(""));
    let _others: Vec<Ws> = futures_util::future::join_all(joins).await;
    server.wait_for_clients(50).await;

    let mut counts = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_millis(800);
    while let Ok(Some(Ok(msg))) = tokio::time::timeout_at(deadline, observer.next()).await {
        if let Message::Text(text) = msg {
            let event: Value = serde_json::from_str(text.as_str()).unwrap();
            assert_eq!(event["type"], "viewer_count");
            counts.push(event["count"].as_u64().unwrap());
        }
    }

    assert!(!counts.is_empty());
    assert!(counts.len() < 50, "got {} viewer_count events", counts.len());
    assert_eq!(counts.last(), Some(&50));
}

#[tokio::test]
async fn heartbeat_timeout_closes_with_1001() {
    let server = TestServer::start(RealtimeConfig {
        heartbeat_interval_ms: 100,
        max_missed_pongs: 2,
        ..RealtimeConfig::default()
    })
    .await;
    let mut silent = server.connect("").await;
    server.wait_for_clients(1).await;

    // not reading means no pongs go back
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(close_code(&mut silent).await, 1001);
    server.wait_for_clients(0).await;
}

#[tokio::test]
async fn unknown_control_type_is_a_protocol_violation() {
    let server = TestServer::default().await;
    let mut ws = server.connect("").await;
    server.wait_for_clients(1).await;

    ws.send(Message::Text(r#"{"type":"shout","text":"hi"}"#.into()))
        .await
        .unwrap();
    assert_eq!(close_code(&mut ws).await, 1003);
    server.wait_for_clients(0).await;
}

#[tokio::test]
async fn binary_frames_are_rejected() {
    let server = TestServer::default().await;
    let mut ws = server.connect("").await;
    server.wait_for_clients(1).await;

    ws.send(Message::Binary(vec![1u8, 2, 3].into())).await.unwrap();
    assert_eq!(close_code(&mut ws).await, 1003);
}

#[tokio::test]
async fn wrong_admin_token_is_refused() {
    let server = TestServer::default().await;
    let url = format!("ws://{}/ws?admin=wrong", server.addr);
    match connect_async(url).await {
        Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => {
            assert_eq!(resp.status(), 401);
        }
        other => panic!("expected HTTP 401, got {:?}", other.map(|_| ())),
    }
    assert_eq!(server.state.hub.client_count(), 0);
}

#[tokio::test]
async fn customer_updates_only_reach_admins() {
    let server = TestServer::default().await;
    let mut admin = server.connect(&format!("?admin={ADMIN_TOKEN}")).await;
    let mut viewer = server.connect("").await;
    server.wait_for_clients(2).await;
    subscribe(&mut viewer, &["customer_update", "chat_message"]).await;

    let created: Value = server
        .post("/api/admin/customers", json!({"customer_number": "10299"}))
        .await
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();
    let resp = server
        .post(&format!("/api/admin/customers/{id}/block"), json!({}))
        .await;
    assert_eq!(resp.status(), 200);

    let update = next_of_kind(&mut admin, "customer_update").await;
    assert_eq!(update["customer_number"], "10299");
    assert_eq!(update["activation_status"], "blocked");

    // a chat sent afterwards is the first thing the viewer sees
    server
        .post("/api/chat", json!({"username": "u", "message": "after"}))
        .await;
    let first = next_json(&mut viewer).await;
    assert_eq!(first["type"], "chat_message");
}

#[tokio::test]
async fn shutdown_closes_sockets_with_1001() {
    let server = TestServer::default().await;
    let mut ws = server.connect("").await;
    server.wait_for_clients(1).await;

    server.state.hub.shutdown().await;
    assert_eq!(close_code(&mut ws).await, 1001);
    assert_eq!(server.state.hub.client_count(), 0);
}
