//! WebSocket transport
//!
//! `tokio-tungstenite` client. The socket is split: a reader task forwards
//! frames to the event channel, and writes go through a mutex around the sink
//! half so concurrent senders never interleave.

use super::transport::{Transport, TransportConnection, TransportError, TransportEvent, TransportSink};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens gateway connections over WebSocket (plain or TLS)
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    event_buffer: usize,
}

impl WebSocketTransport {
    /// `event_buffer` bounds the inbound frames queued ahead of the runner
    #[must_use]
    pub fn new(event_buffer: usize) -> Self {
        Self {
            event_buffer: event_buffer.max(1),
        }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, url: &str) -> Result<TransportConnection, TransportError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        tracing::debug!(url = %url, "WebSocket connected");

        let (write, read) = stream.split();
        let open = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel(self.event_buffer);

        tokio::spawn(read_frames(read, tx, open.clone()));

        let sink = Arc::new(WebSocketSink {
            write: Mutex::new(write),
            open,
        });

        Ok(TransportConnection::new(sink, rx))
    }
}

/// Forward inbound frames until the socket closes or the receiver goes away
async fn read_frames(
    mut read: SplitStream<WsStream>,
    events: mpsc::Sender<TransportEvent>,
    open: Arc<AtomicBool>,
) {
    let mut close_code = None;

    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if events.send(TransportEvent::Message(text.to_string())).await.is_err() {
                    break;
                }
            }
            Ok(Message::Binary(data)) => {
                tracing::debug!(len = data.len(), "Ignoring binary frame");
            }
            Ok(Message::Close(frame)) => {
                close_code = frame.map(|f| u16::from(f.code));
                tracing::debug!(code = ?close_code, "Peer closed WebSocket");
                break;
            }
            Ok(_) => {
                // Ping/pong are answered by tungstenite
            }
            Err(e) => {
                let _ = events.send(TransportEvent::Error(e.to_string())).await;
                break;
            }
        }
    }

    open.store(false, Ordering::Release);
    let _ = events.send(TransportEvent::Closed(close_code)).await;
}

struct WebSocketSink {
    write: Mutex<SplitSink<WsStream, Message>>,
    open: Arc<AtomicBool>,
}

#[async_trait]
impl TransportSink for WebSocketSink {
    async fn send(&self, text: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }

        let mut write = self.write.lock().await;
        write.send(Message::Text(text.into())).await.map_err(|e| match e {
            WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::NotOpen,
            other => TransportError::SendFailed(other.to_string()),
        })
    }

    async fn close(&self, code: u16) {
        if !self.open.swap(false, Ordering::AcqRel) {
            return;
        }

        let frame = CloseFrame {
            code: WsCloseCode::from(code),
            reason: "".into(),
        };

        let mut write = self.write.lock().await;
        if let Err(e) = write.send(Message::Close(Some(frame))).await {
            tracing::debug!(error = %e, "Failed to send close frame");
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}
