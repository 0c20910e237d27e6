//! Test helpers for integration tests
//!
//! Provides a client wired to the scripted gateway, plus waits on the
//! client's notification stream.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use gateway_client::connection::mock::{MockGateway, MockPeer, MockTransport};
use gateway_client::{ClientEvent, GatewayClient, OpCode};
use gateway_common::ClientConfig;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Default wait for anything the client is expected to do
pub const WAIT: Duration = Duration::from_secs(30);

/// Mock gateway base URL
pub const MOCK_URL: &str = "ws://mock.gateway";

/// Config with short backoff windows
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::new("integration-token").with_gateway_url(MOCK_URL);
    config.reconnect.backoff_base_ms = 100;
    config.reconnect.backoff_max_ms = 1_000;
    config.reconnect.invalid_session_min_ms = 1_000;
    config.reconnect.invalid_session_max_ms = 5_000;
    config
}

/// Client running against the scripted gateway
pub struct TestClient {
    pub client: GatewayClient,
    pub gateway: MockGateway,
    pub events: broadcast::Receiver<ClientEvent>,
    handle: Option<JoinHandle<()>>,
}

impl TestClient {
    /// Build and start a client
    pub fn start() -> Result<Self> {
        Self::start_with_config(test_config())
    }

    pub fn start_with_config(config: ClientConfig) -> Result<Self> {
        let (transport, gateway) = MockTransport::new();
        let client = GatewayClient::with_transport(config, Arc::new(transport))?;
        let events = client.subscribe();
        let handle = client.start()?;

        Ok(Self {
            client,
            gateway,
            events,
            handle: Some(handle),
        })
    }

    /// Wait for the client's next connection
    pub async fn accept(&mut self) -> Result<MockPeer> {
        tokio::time::timeout(WAIT, self.gateway.accept())
            .await
            .map_err(|_| anyhow!("client did not connect"))?
            .ok_or_else(|| anyhow!("mock gateway closed"))
    }

    /// Accept, complete Hello and Identify, and deliver READY
    pub async fn connect_ready(&mut self, session_id: &str, sequence: u64) -> Result<MockPeer> {
        let mut peer = self.accept().await?;
        peer.hello(45_000).await;
        expect_op(&mut peer, OpCode::Identify).await?;

        peer.ready(session_id, sequence).await;
        self.wait_for(|e| matches!(e, ClientEvent::SessionReady { .. }))
            .await?;

        Ok(peer)
    }

    /// Skip notifications until one matches
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> Result<ClientEvent>
    where
        F: FnMut(&ClientEvent) -> bool,
    {
        let events = &mut self.events;
        tokio::time::timeout(WAIT, async move {
            loop {
                match events.recv().await {
                    Ok(event) if predicate(&event) => return Ok(event),
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => return Err(anyhow!("notifier closed")),
                }
            }
        })
        .await
        .map_err(|_| anyhow!("timed out waiting for client event"))?
    }

    /// Wait for the connection loop to end on its own
    pub async fn join(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            tokio::time::timeout(WAIT, handle)
                .await
                .map_err(|_| anyhow!("client did not stop"))??;
        }
        Ok(())
    }

    /// Shut the client down and wait for it
    pub async fn stop(mut self) -> Result<()> {
        self.client.shutdown();
        self.join().await
    }
}

/// Next frame from the client with the given op code
pub async fn expect_op(peer: &mut MockPeer, op: OpCode) -> Result<Value> {
    tokio::time::timeout(WAIT, peer.recv_op(op))
        .await
        .map_err(|_| anyhow!("timed out waiting for op {op}"))?
        .ok_or_else(|| anyhow!("connection closed before op {op}"))
}
