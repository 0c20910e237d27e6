//! Scripted in-memory transport
//!
//! Every `open` hands the test a [`MockPeer`] through [`MockGateway::accept`].
//! The peer plays the server: it pushes frames, closes with a code, and reads
//! what the client sent.

use super::transport::{Transport, TransportConnection, TransportError, TransportEvent, TransportSink};
use crate::protocol::OpCode;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const PEER_BUFFER: usize = 256;

#[derive(Default)]
struct MockShared {
    opens: AtomicU32,
    failures_left: AtomicU32,
}

/// Transport half handed to the client
#[derive(Clone)]
pub struct MockTransport {
    shared: Arc<MockShared>,
    accepted: mpsc::UnboundedSender<MockPeer>,
}

/// Test half: receives one peer per successful `open`
pub struct MockGateway {
    shared: Arc<MockShared>,
    accepted: mpsc::UnboundedReceiver<MockPeer>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> (Self, MockGateway) {
        let shared = Arc::new(MockShared::default());
        let (tx, rx) = mpsc::unbounded_channel();

        (
            Self {
                shared: shared.clone(),
                accepted: tx,
            },
            MockGateway {
                shared,
                accepted: rx,
            },
        )
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, url: &str) -> Result<TransportConnection, TransportError> {
        self.shared.opens.fetch_add(1, Ordering::AcqRel);

        let failing = self
            .shared
            .failures_left
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::ConnectFailed("scripted failure".to_string()));
        }

        let (event_tx, event_rx) = mpsc::channel(PEER_BUFFER);
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));
        let client_close = Arc::new(Mutex::new(None));

        let peer = MockPeer {
            url: url.to_string(),
            events: event_tx,
            outbound: out_rx,
            open: open.clone(),
            client_close: client_close.clone(),
        };
        self.accepted
            .send(peer)
            .map_err(|_| TransportError::ConnectFailed("mock gateway dropped".to_string()))?;

        let sink = Arc::new(MockSink {
            outbound: out_tx,
            open,
            client_close,
        });

        Ok(TransportConnection::new(sink, event_rx))
    }
}

struct MockSink {
    outbound: mpsc::UnboundedSender<String>,
    open: Arc<AtomicBool>,
    client_close: Arc<Mutex<Option<u16>>>,
}

#[async_trait]
impl TransportSink for MockSink {
    async fn send(&self, text: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        self.outbound.send(text).map_err(|_| TransportError::NotOpen)
    }

    async fn close(&self, code: u16) {
        if self.open.swap(false, Ordering::AcqRel) {
            *self.client_close.lock() = Some(code);
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl MockGateway {
    /// Wait for the client's next connection
    pub async fn accept(&mut self) -> Option<MockPeer> {
        self.accepted.recv().await
    }

    /// Make the next `count` opens fail
    pub fn fail_next_opens(&self, count: u32) {
        self.shared.failures_left.store(count, Ordering::Release);
    }

    /// Number of `open` calls so far, failed ones included
    #[must_use]
    pub fn opens(&self) -> u32 {
        self.shared.opens.load(Ordering::Acquire)
    }
}

/// Server side of one mock connection
pub struct MockPeer {
    url: String,
    events: mpsc::Sender<TransportEvent>,
    outbound: mpsc::UnboundedReceiver<String>,
    open: Arc<AtomicBool>,
    client_close: Arc<Mutex<Option<u16>>>,
}

impl MockPeer {
    /// URL the client opened
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Push a raw text frame
    pub async fn push(&self, raw: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Message(raw.into())).await;
    }

    /// Push a JSON frame
    pub async fn push_json(&self, frame: Value) {
        self.push(frame.to_string()).await;
    }

    pub async fn hello(&self, interval_ms: u64) {
        self.push_json(json!({"op": 10, "d": {"heartbeat_interval": interval_ms}}))
            .await;
    }

    pub async fn heartbeat_ack(&self) {
        self.push_json(json!({"op": 11})).await;
    }

    pub async fn dispatch(&self, event: &str, sequence: u64, data: Value) {
        self.push_json(json!({"op": 0, "t": event, "s": sequence, "d": data}))
            .await;
    }

    /// READY with a minimal user
    pub async fn ready(&self, session_id: &str, sequence: u64) {
        self.dispatch(
            "READY",
            sequence,
            json!({
                "v": 9,
                "session_id": session_id,
                "user": {"id": "1", "username": "mock-user", "bot": true},
                "guilds": [],
            }),
        )
        .await;
    }

    pub async fn resumed(&self, sequence: u64) {
        self.dispatch("RESUMED", sequence, Value::Null).await;
    }

    pub async fn invalid_session(&self, resumable: bool) {
        self.push_json(json!({"op": 9, "d": resumable})).await;
    }

    pub async fn request_reconnect(&self) {
        self.push_json(json!({"op": 7, "d": null})).await;
    }

    /// Report a read error
    pub async fn fail(&self, error: &str) {
        let _ = self.events.send(TransportEvent::Error(error.to_string())).await;
    }

    /// Close from the server side
    pub async fn close(&self, code: Option<u16>) {
        self.open.store(false, Ordering::Release);
        let _ = self.events.send(TransportEvent::Closed(code)).await;
    }

    /// Next frame the client sent
    pub async fn recv(&mut self) -> Option<Value> {
        let raw = self.outbound.recv().await?;
        serde_json::from_str(&raw).ok()
    }

    /// Next frame with the given op code, skipping others
    pub async fn recv_op(&mut self, op: OpCode) -> Option<Value> {
        loop {
            let frame = self.recv().await?;
            if frame["op"].as_u64() == Some(u64::from(op.as_u8())) {
                return Some(frame);
            }
        }
    }

    /// Next frame if one is already queued
    pub fn try_recv(&mut self) -> Option<Value> {
        let raw = self.outbound.try_recv().ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// Every frame the client sends within `window`
    pub async fn collect_for(&mut self, window: Duration) -> Vec<Value> {
        let mut frames = Vec::new();
        let deadline = tokio::time::Instant::now() + window;

        while let Ok(Some(frame)) = tokio::time::timeout_at(deadline, self.recv()).await {
            frames.push(frame);
        }
        frames
    }

    /// Whether the connection is still open from both sides
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Close code the client used, if it closed the connection
    #[must_use]
    pub fn client_close_code(&self) -> Option<u16> {
        *self.client_close.lock()
    }
}
