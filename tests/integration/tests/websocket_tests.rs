//! WebSocket transport tests
//!
//! Run the client against a small tokio-tungstenite server on localhost.
//!
//! Run with: cargo test -p integration-tests --test websocket_tests

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use gateway_client::{ClientEvent, GatewayClient};
use integration_tests::{hello_frame, ready_frame, test_config};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

const WAIT: Duration = Duration::from_secs(10);

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = tokio::time::timeout(WAIT, listener.accept())
        .await
        .unwrap()
        .unwrap();
    accept_async(stream).await.unwrap()
}

async fn send_json(ws: &mut WebSocketStream<TcpStream>, frame: &Value) {
    ws.send(Message::Text(frame.to_string())).await.unwrap();
}

/// Next text frame parsed as JSON, skipping heartbeats
async fn recv_non_heartbeat(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        let message = tokio::time::timeout(WAIT, ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = message {
            let frame: Value = serde_json::from_str(&text).unwrap();
            if frame["op"] != 1 {
                return frame;
            }
        }
    }
}

async fn wait_for<F>(events: &mut broadcast::Receiver<ClientEvent>, mut predicate: F) -> ClientEvent
where
    F: FnMut(&ClientEvent) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            if let Ok(event) = events.recv().await {
                if predicate(&event) {
                    return event;
                }
            }
        }
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_handshake_over_websocket() {
    let (listener, url) = bind().await;
    let client = GatewayClient::new(test_config().with_gateway_url(url)).unwrap();
    let mut events = client.subscribe();
    let handle = client.start().unwrap();

    let mut ws = accept(&listener).await;
    send_json(&mut ws, &hello_frame(45_000)).await;

    let identify = recv_non_heartbeat(&mut ws).await;
    assert_eq!(identify["op"], 2);
    assert_eq!(identify["d"]["token"], "integration-token");

    send_json(&mut ws, &ready_frame("ws-session", 1)).await;
    let ready = wait_for(&mut events, |e| matches!(e, ClientEvent::SessionReady { .. })).await;
    assert!(matches!(ready, ClientEvent::SessionReady { session_id } if session_id == "ws-session"));
    assert!(client.is_connected());

    client.shutdown();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();

    // The client closes with a normal close frame
    let closed = loop {
        match tokio::time::timeout(WAIT, ws.next()).await.unwrap() {
            Some(Ok(Message::Close(frame))) => break frame,
            Some(Ok(_)) => {}
            other => panic!("expected close frame, got {other:?}"),
        }
    };
    assert_eq!(closed.map(|f| u16::from(f.code)), Some(1000));
}

#[tokio::test]
async fn test_server_close_code_reaches_client() {
    let (listener, url) = bind().await;
    let client = GatewayClient::new(test_config().with_gateway_url(url)).unwrap();
    let mut events = client.subscribe();
    let handle = client.start().unwrap();

    let mut ws = accept(&listener).await;
    send_json(&mut ws, &hello_frame(45_000)).await;
    recv_non_heartbeat(&mut ws).await;

    ws.close(Some(CloseFrame {
        code: CloseCode::from(4004),
        reason: "Authentication failed".into(),
    }))
    .await
    .unwrap();

    let closed = wait_for(&mut events, |e| matches!(e, ClientEvent::ConnectionClosed { .. })).await;
    assert!(matches!(
        closed,
        ClientEvent::ConnectionClosed { code: Some(4004), reconnect: false, .. }
    ));

    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
    assert!(!client.is_running());
}

#[tokio::test]
async fn test_dropped_connection_resumes() {
    let (listener, url) = bind().await;
    let client = GatewayClient::new(test_config().with_gateway_url(url)).unwrap();
    let mut events = client.subscribe();
    let handle = client.start().unwrap();

    let mut ws = accept(&listener).await;
    send_json(&mut ws, &hello_frame(45_000)).await;
    recv_non_heartbeat(&mut ws).await;
    send_json(&mut ws, &ready_frame("ws-session", 9)).await;
    wait_for(&mut events, |e| matches!(e, ClientEvent::SessionReady { .. })).await;

    // Drop the TCP connection without a close frame
    drop(ws);

    let mut ws = accept(&listener).await;
    send_json(&mut ws, &hello_frame(45_000)).await;
    let resume = recv_non_heartbeat(&mut ws).await;
    assert_eq!(resume["op"], 6);
    assert_eq!(resume["d"]["session_id"], "ws-session");
    assert_eq!(resume["d"]["seq"], 9);

    client.shutdown();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
}
