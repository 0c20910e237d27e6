//! Gateway client facade
//!
//! Owns the session, heartbeat controller, entity cache and notifier, and runs
//! the connection loop on a background task.

mod error;
mod events;
mod runner;

pub use error::ClientError;
pub use events::{ClientEvent, Notifier};

use crate::cache::EntityCache;
use crate::connection::{
    ConnectionLink, HeartbeatController, Session, SessionSnapshot, Transport, WebSocketTransport,
};
use crate::handlers::{EventRouter, HandlerContext};
use crate::protocol::{OpCode, StatusUpdatePayload};
use gateway_common::ClientConfig;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub(crate) struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    session: Arc<Session>,
    heartbeat: Arc<HeartbeatController>,
    cache: Arc<EntityCache>,
    notifier: Arc<Notifier>,
    router: EventRouter,
    shutdown: CancellationToken,
    active: Mutex<Option<ConnectionLink>>,
    running: AtomicBool,
}

/// Persistent, resumable gateway client
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<ClientInner>,
}

impl GatewayClient {
    /// Client connecting over WebSocket
    ///
    /// Fails if the configuration is unusable (e.g. empty token).
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = Arc::new(WebSocketTransport::new(config.gateway.event_buffer));
        Self::with_transport(config, transport)
    }

    /// Client using a custom transport
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ClientError> {
        config.validate()?;

        let session = Arc::new(Session::new());
        let heartbeat = Arc::new(HeartbeatController::new(config.heartbeat.max_missed));
        let cache = Arc::new(EntityCache::new(config.cache.messages_per_channel));
        let notifier = Arc::new(Notifier::new(config.gateway.event_buffer));

        let ctx = HandlerContext::new(
            &config,
            session.clone(),
            heartbeat.clone(),
            cache.clone(),
            notifier.clone(),
        );

        tracing::debug!(
            url = %config.gateway.url,
            token = %config.auth.token,
            "Gateway client created"
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                session,
                heartbeat,
                cache,
                notifier,
                router: EventRouter::new(Arc::new(ctx)),
                shutdown: CancellationToken::new(),
                active: Mutex::new(None),
                running: AtomicBool::new(false),
            }),
        })
    }

    /// Receive connection, session and dispatch notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.notifier.subscribe()
    }

    /// Start the connection loop
    ///
    /// The returned task finishes after [`Self::shutdown`] or a non-recoverable close.
    pub fn start(&self) -> Result<JoinHandle<()>, ClientError> {
        if self.inner.running.swap(true, Ordering::AcqRel) {
            return Err(ClientError::AlreadyRunning);
        }

        let inner = self.inner.clone();
        Ok(tokio::spawn(async move {
            runner::run(inner.clone()).await;
            inner.running.store(false, Ordering::Release);
        }))
    }

    /// Stop the client; the current connection is closed normally
    pub fn shutdown(&self) {
        tracing::info!("Gateway client shutting down");
        self.inner.shutdown.cancel();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Whether a transport connection is currently open
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner
            .active
            .lock()
            .as_ref()
            .is_some_and(ConnectionLink::is_open)
    }

    /// Immutable copy of the session state
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.session.snapshot()
    }

    /// Latency measured on the last acknowledged heartbeat
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.inner.session.latency()
    }

    /// Cache of entities seen through dispatch events
    #[must_use]
    pub fn cache(&self) -> Arc<EntityCache> {
        self.inner.cache.clone()
    }

    /// Send an arbitrary frame on the current connection
    pub async fn send<T>(&self, op: OpCode, data: &T) -> Result<(), ClientError>
    where
        T: Serialize + ?Sized + Sync,
    {
        let link = self
            .inner
            .active
            .lock()
            .clone()
            .filter(ConnectionLink::is_open)
            .ok_or(ClientError::NotConnected)?;

        link.send(op, data).await?;
        Ok(())
    }

    /// Update the presence status (op 3)
    pub async fn update_status(&self, status: StatusUpdatePayload) -> Result<(), ClientError> {
        if !status.is_valid_status() {
            return Err(ClientError::InvalidStatus(status.status));
        }

        self.send(OpCode::StatusUpdate, &status).await
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("url", &self.inner.config.gateway.url)
            .field("running", &self.is_running())
            .field("session", &self.inner.session.snapshot())
            .finish()
    }
}
