//! Transport abstraction
//!
//! A transport opens a duplex, message-oriented connection. Inbound traffic is
//! delivered as [`TransportEvent`]s on a channel that the runner awaits, so the
//! transport's own I/O tasks never execute protocol code.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors raised by a transport
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The connection is not (or no longer) open
    #[error("Connection is not open")]
    NotOpen,

    /// The connection could not be established
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    /// A frame could not be written
    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Notification from an open connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame
    Message(String),

    /// A read error; the connection is closing
    Error(String),

    /// The connection closed, with the peer's close code if it sent one
    Closed(Option<u16>),
}

/// Write half of an open connection
///
/// `send` must be safe to call from several tasks at once: the heartbeat loop,
/// the dispatch drain and application sends all write through the same sink.
#[async_trait]
pub trait TransportSink: Send + Sync {
    /// Send one text frame
    ///
    /// Fails with [`TransportError::NotOpen`] once the connection has closed.
    async fn send(&self, text: String) -> Result<(), TransportError>;

    /// Close the connection with a close code
    async fn close(&self, code: u16);

    /// Whether the connection is still open
    fn is_open(&self) -> bool;
}

/// An open connection: the shared write half and the inbound event stream
pub struct TransportConnection {
    pub sink: Arc<dyn TransportSink>,
    pub events: mpsc::Receiver<TransportEvent>,
}

impl TransportConnection {
    #[must_use]
    pub fn new(sink: Arc<dyn TransportSink>, events: mpsc::Receiver<TransportEvent>) -> Self {
        Self { sink, events }
    }

    #[must_use]
    pub fn into_parts(self) -> (Arc<dyn TransportSink>, mpsc::Receiver<TransportEvent>) {
        (self.sink, self.events)
    }
}

/// Factory for connections
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection to `url`
    async fn open(&self, url: &str) -> Result<TransportConnection, TransportError>;
}
