//! Client notifications
//!
//! Everything an application observes about the connection is published on a
//! broadcast channel. Slow subscribers lag and skip; they never block the
//! dispatch drain.

use crate::dispatch::{FaultSink, HandlerFault};
use crate::events::DispatchEvent;
use crate::model::Message;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Notification published by the client
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A transport connection was opened
    ConnectionOpened { attempt: u64 },

    /// A transport connection closed
    ///
    /// `reconnect` is false only when the client is stopping for good.
    ConnectionClosed {
        attempt: u64,
        code: Option<u16>,
        reconnect: bool,
    },

    /// READY: a fresh session was established
    SessionReady { session_id: String },

    /// RESUMED: the previous session was re-attached
    SessionResumed { session_id: String },

    /// A typed dispatch event was applied
    Dispatch {
        sequence: Option<u64>,
        event: Arc<DispatchEvent>,
    },

    /// A message was deleted; carries the cached copy or an id-only stub
    MessageDeleted { message: Message },

    /// A unit of work failed
    HandlerFailed {
        attempt: u64,
        label: String,
        error: String,
    },
}

/// Publishes [`ClientEvent`]s
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<ClientEvent>,
}

impl Notifier {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event; having no subscribers is fine
    pub fn emit(&self, event: ClientEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }
}

impl FaultSink for Notifier {
    fn report(&self, fault: HandlerFault) {
        self.emit(ClientEvent::HandlerFailed {
            attempt: fault.attempt,
            label: fault.label,
            error: fault.error.to_string(),
        });
    }
}
