//! Gateway client integration tests
//!
//! Drive a full client against the scripted in-memory gateway with paused
//! time, so heartbeat and backoff timings are deterministic.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::sync::Arc;
use std::time::Duration;

use gateway_client::connection::mock::MockTransport;
use gateway_client::model::Snowflake;
use gateway_client::{
    ClientError, ClientEvent, DispatchEvent, GatewayClient, OpCode, Phase, StatusUpdatePayload,
};
use gateway_common::{ClientConfig, ConfigError};
use integration_tests::{expect_op, fixtures::*, test_config, TestClient};
use serde_json::json;
use tokio::time::Instant;

// ============================================================================
// Handshake Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_hello_identifies_then_heartbeats_on_interval() {
    let mut t = TestClient::start().unwrap();
    let mut peer = t.accept().await.unwrap();
    assert_eq!(peer.url(), "ws://mock.gateway/?v=9&encoding=json");

    peer.hello(40).await;

    let identify = peer.recv().await.unwrap();
    assert_eq!(identify["op"], 2);
    assert_eq!(identify["d"]["token"], "integration-token");
    assert!(identify["d"]["properties"].is_object());

    let first = peer.recv().await.unwrap();
    assert_eq!(first["op"], 1);
    assert!(first["d"].is_null());

    let start = Instant::now();
    for _ in 0..3 {
        expect_op(&mut peer, OpCode::Heartbeat).await.unwrap();
    }
    let elapsed = start.elapsed();
    assert!(
        elapsed >= Duration::from_millis(120) && elapsed < Duration::from_millis(125),
        "three intervals took {elapsed:?}"
    );

    assert_eq!(t.client.snapshot().phase, Phase::Identifying);
    t.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_ready_establishes_session() {
    let mut t = TestClient::start().unwrap();
    let mut peer = t.connect_ready("abc", 1).await.unwrap();

    let snapshot = t.client.snapshot();
    assert_eq!(snapshot.session_id.as_deref(), Some("abc"));
    assert_eq!(snapshot.last_sequence, Some(1));
    assert_eq!(snapshot.phase, Phase::Ready);
    assert!(t.client.is_connected());

    let cache = t.client.cache();
    assert_eq!(cache.current_user().unwrap().id, Snowflake::new(1));

    // Later heartbeats carry the sequence from READY
    let heartbeat = loop {
        let frame = expect_op(&mut peer, OpCode::Heartbeat).await.unwrap();
        if !frame["d"].is_null() {
            break frame;
        }
    };
    assert_eq!(heartbeat["d"], 1);

    // One ack per heartbeat sent so far
    peer.heartbeat_ack().await;
    peer.heartbeat_ack().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(t.client.latency(), Some(Duration::ZERO));
    assert_eq!(t.client.snapshot().outstanding_heartbeats, 0);

    t.stop().await.unwrap();
    assert_eq!(peer.client_close_code(), Some(1000));
}

// ============================================================================
// Dispatch Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_sequence_gap_is_accepted() {
    let mut t = TestClient::start().unwrap();
    let peer = t.connect_ready("abc", 1).await.unwrap();

    let (guild_id, channel_id, message_id) = (unique_id(), unique_id(), unique_id());
    peer.dispatch("GUILD_CREATE", 3, guild_create(guild_id, channel_id))
        .await;
    peer.dispatch("MESSAGE_CREATE", 5, message_create(message_id, channel_id, "hi"))
        .await;

    t.wait_for(|e| matches!(e, ClientEvent::Dispatch { sequence: Some(5), .. }))
        .await
        .unwrap();

    let snapshot = t.client.snapshot();
    assert_eq!(snapshot.last_sequence, Some(5));
    assert_eq!(snapshot.phase, Phase::Dispatching);

    let cache = t.client.cache();
    let channel = cache.channel(Snowflake::new(channel_id)).unwrap();
    assert_eq!(channel.guild_id, Some(Snowflake::new(guild_id)));
    let message = cache
        .message(Snowflake::new(channel_id), Snowflake::new(message_id))
        .unwrap();
    assert_eq!(message.content.as_deref(), Some("hi"));

    // A stale sequence is applied but never moves the counter back
    peer.dispatch("MESSAGE_DELETE", 4, message_delete(message_id, channel_id))
        .await;
    let deleted = t
        .wait_for(|e| matches!(e, ClientEvent::MessageDeleted { .. }))
        .await
        .unwrap();
    match deleted {
        ClientEvent::MessageDeleted { message } => {
            assert_eq!(message.content.as_deref(), Some("hi"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(t.client.snapshot().last_sequence, Some(5));

    t.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_dispatches_are_notified_in_arrival_order() {
    let mut t = TestClient::start().unwrap();
    let peer = t.connect_ready("abc", 1).await.unwrap();

    let channel_id = unique_id();
    for seq in 2..12 {
        peer.dispatch("MESSAGE_CREATE", seq, message_create(seq, channel_id, "x"))
            .await;
    }

    let mut seen = Vec::new();
    while seen.len() < 10 {
        if let ClientEvent::Dispatch { sequence, event } = t
            .wait_for(|e| matches!(e, ClientEvent::Dispatch { .. }))
            .await
            .unwrap()
        {
            assert!(matches!(*event, DispatchEvent::MessageCreate(_)));
            seen.push(sequence.unwrap());
        }
    }
    assert_eq!(seen, (2..12).collect::<Vec<_>>());
    assert_eq!(t.client.cache().messages(Snowflake::new(channel_id)).len(), 10);

    t.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_is_dropped() {
    let mut t = TestClient::start().unwrap();
    let peer = t.connect_ready("abc", 1).await.unwrap();

    peer.push("{not json").await;
    peer.push_json(json!({"op": "ten"})).await;
    peer.dispatch("MESSAGE_CREATE", 2, message_create(unique_id(), unique_id(), "still here"))
        .await;

    t.wait_for(|e| matches!(e, ClientEvent::Dispatch { sequence: Some(2), .. }))
        .await
        .unwrap();
    assert!(t.client.is_connected());
    assert_eq!(t.gateway.opens(), 1);

    t.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_handler_fault_does_not_stop_processing() {
    let mut t = TestClient::start().unwrap();
    let peer = t.connect_ready("abc", 1).await.unwrap();

    // GUILD_CREATE without an id fails to decode
    peer.dispatch("GUILD_CREATE", 2, json!({"name": "broken"})).await;
    peer.dispatch("MESSAGE_CREATE", 3, message_create(unique_id(), unique_id(), "next"))
        .await;

    let fault = t
        .wait_for(|e| matches!(e, ClientEvent::HandlerFailed { .. }))
        .await
        .unwrap();
    match fault {
        ClientEvent::HandlerFailed { label, .. } => assert!(label.contains("GUILD_CREATE")),
        other => panic!("unexpected event {other:?}"),
    }

    t.wait_for(|e| matches!(e, ClientEvent::Dispatch { sequence: Some(3), .. }))
        .await
        .unwrap();
    assert_eq!(t.client.snapshot().last_sequence, Some(3));
    assert!(t.client.is_connected());

    t.stop().await.unwrap();
}

// ============================================================================
// Reconnect Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_close_with_session_resumes() {
    let mut t = TestClient::start().unwrap();
    let peer = t.connect_ready("abc", 1).await.unwrap();

    peer.dispatch("MESSAGE_CREATE", 7, message_create(unique_id(), unique_id(), "m"))
        .await;
    t.wait_for(|e| matches!(e, ClientEvent::Dispatch { sequence: Some(7), .. }))
        .await
        .unwrap();

    let closed_at = Instant::now();
    peer.close(Some(4000)).await;

    let closed = t
        .wait_for(|e| matches!(e, ClientEvent::ConnectionClosed { .. }))
        .await
        .unwrap();
    assert!(matches!(
        closed,
        ClientEvent::ConnectionClosed { code: Some(4000), reconnect: true, .. }
    ));

    let mut next = t.accept().await.unwrap();
    // An established connection reconnects without backoff
    assert_eq!(closed_at.elapsed(), Duration::ZERO);

    next.hello(45_000).await;
    let resume = next.recv().await.unwrap();
    assert_eq!(resume["op"], 6);
    assert_eq!(resume["d"]["session_id"], "abc");
    assert_eq!(resume["d"]["seq"], 7);
    assert_eq!(resume["d"]["token"], "integration-token");

    next.resumed(8).await;
    let resumed = t
        .wait_for(|e| matches!(e, ClientEvent::SessionResumed { .. }))
        .await
        .unwrap();
    assert!(matches!(resumed, ClientEvent::SessionResumed { session_id } if session_id == "abc"));

    let snapshot = t.client.snapshot();
    assert_eq!(snapshot.phase, Phase::Ready);
    assert_eq!(snapshot.last_sequence, Some(8));
    assert_eq!(snapshot.attempt, 2);

    t.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_close_before_ready_identifies_after_backoff() {
    let mut t = TestClient::start().unwrap();
    let mut peer = t.accept().await.unwrap();
    peer.hello(45_000).await;
    expect_op(&mut peer, OpCode::Identify).await.unwrap();

    let closed_at = Instant::now();
    peer.close(None).await;

    let mut next = t.accept().await.unwrap();
    let waited = closed_at.elapsed();
    assert!(
        waited >= Duration::from_millis(50) && waited <= Duration::from_millis(100),
        "backoff was {waited:?}"
    );

    next.hello(45_000).await;
    let frame = next.recv().await.unwrap();
    assert_eq!(frame["op"], 2);

    t.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_session_timeout_close_forces_identify() {
    let mut t = TestClient::start().unwrap();
    let peer = t.connect_ready("abc", 3).await.unwrap();

    peer.close(Some(4009)).await;

    let mut next = t.accept().await.unwrap();
    assert!(t.client.snapshot().session_id.is_none());

    next.hello(45_000).await;
    let frame = next.recv().await.unwrap();
    assert_eq!(frame["op"], 2);

    t.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failed_opens_back_off() {
    let (transport, mut gateway) = MockTransport::new();
    gateway.fail_next_opens(2);

    let client = GatewayClient::with_transport(test_config(), Arc::new(transport)).unwrap();
    let started = Instant::now();
    let handle = client.start().unwrap();

    let _peer = tokio::time::timeout(Duration::from_secs(30), gateway.accept())
        .await
        .unwrap()
        .unwrap();
    let waited = started.elapsed();

    assert_eq!(gateway.opens(), 3);
    // Two jittered delays: [50, 100] then [100, 200]
    assert!(
        waited >= Duration::from_millis(150) && waited <= Duration::from_millis(300),
        "backoff was {waited:?}"
    );

    client.shutdown();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_invalid_session_waits_then_identifies_once() {
    let mut t = TestClient::start().unwrap();
    let mut peer = t.connect_ready("abc", 1).await.unwrap();

    let start = Instant::now();
    peer.invalid_session(false).await;

    let identify = expect_op(&mut peer, OpCode::Identify).await.unwrap();
    let waited = start.elapsed();
    assert_eq!(identify["d"]["token"], "integration-token");
    assert!(
        waited > Duration::ZERO && waited <= Duration::from_secs(5),
        "waited {waited:?}"
    );
    assert!(waited >= Duration::from_secs(1));
    assert!(t.client.snapshot().session_id.is_none());
    assert_eq!(t.client.snapshot().phase, Phase::Identifying);

    // Nothing but heartbeats follows the single identify
    let later = peer.collect_for(Duration::from_secs(10)).await;
    assert!(later.iter().all(|f| f["op"] == 1), "unexpected frames {later:?}");

    peer.ready("def", 2).await;
    let ready = t
        .wait_for(|e| matches!(e, ClientEvent::SessionReady { .. }))
        .await
        .unwrap();
    assert!(matches!(ready, ClientEvent::SessionReady { session_id } if session_id == "def"));
    assert_eq!(t.gateway.opens(), 1);

    t.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_server_reconnect_request() {
    let mut t = TestClient::start().unwrap();
    let peer = t.connect_ready("abc", 4).await.unwrap();

    peer.request_reconnect().await;

    let mut next = t.accept().await.unwrap();
    assert_eq!(peer.client_close_code(), Some(4000));

    next.hello(45_000).await;
    let resume = expect_op(&mut next, OpCode::Resume).await.unwrap();
    assert_eq!(resume["d"]["session_id"], "abc");
    assert_eq!(resume["d"]["seq"], 4);

    t.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_missed_heartbeats_force_reconnect() {
    let mut config = test_config();
    config.heartbeat.max_missed = Some(2);

    let mut t = TestClient::start_with_config(config).unwrap();
    let mut peer = t.accept().await.unwrap();
    peer.hello(40).await;
    expect_op(&mut peer, OpCode::Identify).await.unwrap();
    peer.ready("abc", 1).await;

    // Never acknowledge
    let mut next = t.accept().await.unwrap();
    assert_eq!(peer.client_close_code(), Some(4000));

    next.hello(40).await;
    expect_op(&mut next, OpCode::Resume).await.unwrap();

    t.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_fatal_close_code_stops_client() {
    let mut t = TestClient::start().unwrap();
    let mut peer = t.accept().await.unwrap();
    peer.hello(45_000).await;
    expect_op(&mut peer, OpCode::Identify).await.unwrap();

    peer.close(Some(4004)).await;

    let closed = t
        .wait_for(|e| matches!(e, ClientEvent::ConnectionClosed { .. }))
        .await
        .unwrap();
    assert!(matches!(
        closed,
        ClientEvent::ConnectionClosed { code: Some(4004), reconnect: false, .. }
    ));

    t.join().await.unwrap();
    assert!(!t.client.is_running());
    assert_eq!(t.gateway.opens(), 1);
    assert_eq!(t.client.snapshot().phase, Phase::Closed);
}

// ============================================================================
// Outbound Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_update_status_sends_op_3() {
    let mut t = TestClient::start().unwrap();
    let mut peer = t.connect_ready("abc", 1).await.unwrap();

    let mut status = StatusUpdatePayload::new("idle");
    status.afk = true;
    t.client.update_status(status).await.unwrap();

    let frame = expect_op(&mut peer, OpCode::StatusUpdate).await.unwrap();
    assert_eq!(frame["d"]["status"], "idle");
    assert_eq!(frame["d"]["afk"], true);

    let invalid = t.client.update_status(StatusUpdatePayload::new("away")).await;
    assert!(matches!(invalid, Err(ClientError::InvalidStatus(_))));

    t.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_send_without_connection_fails() {
    let (transport, _gateway) = MockTransport::new();
    let client = GatewayClient::with_transport(test_config(), Arc::new(transport)).unwrap();

    let result = client.send(OpCode::StatusUpdate, &json!({"status": "online"})).await;
    assert!(matches!(result, Err(ClientError::NotConnected)));
    assert!(!client.is_connected());
}

#[test]
fn test_empty_token_is_rejected() {
    let result = GatewayClient::new(ClientConfig::new(""));
    assert!(matches!(
        result,
        Err(ClientError::InvalidConfig(ConfigError::MissingToken))
    ));
}
