//! Per-attempt connection handle
//!
//! A `ConnectionLink` ties an open transport to one connection attempt. Work
//! scheduled for an attempt holds the link; once the attempt is torn down its
//! token is cancelled and any late work can tell it is stale.

use super::transport::{TransportError, TransportSink};
use crate::protocol::{encode, EncodeError, OpCode};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Close code sent when the client drops a connection it wants to resume
pub const RECONNECT_CLOSE_CODE: u16 = 4000;

/// Close code sent on a deliberate shutdown
pub const NORMAL_CLOSE_CODE: u16 = 1000;

/// Outbound frame could not be sent
#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// One connection attempt's transport and cancellation scope
#[derive(Clone)]
pub struct ConnectionLink {
    attempt: u64,
    sink: Arc<dyn TransportSink>,
    cancel: CancellationToken,
}

impl ConnectionLink {
    #[must_use]
    pub fn new(attempt: u64, sink: Arc<dyn TransportSink>, cancel: CancellationToken) -> Self {
        Self {
            attempt,
            sink,
            cancel,
        }
    }

    /// Connection attempt this link belongs to
    #[must_use]
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Encode and send one frame
    ///
    /// Frames are logged by op code only; payloads may carry the credential.
    pub async fn send<T>(&self, op: OpCode, data: &T) -> Result<(), SendError>
    where
        T: Serialize + ?Sized + Sync,
    {
        if self.cancel.is_cancelled() {
            return Err(TransportError::NotOpen.into());
        }

        let frame = encode(op, data)?;
        self.sink.send(frame).await?;

        tracing::trace!(attempt = self.attempt, op = %op, "Frame sent");
        Ok(())
    }

    /// Ask the runner to drop this connection and resume on a new one
    pub fn request_reconnect(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!(attempt = self.attempt, "Reconnect requested");
            self.cancel.cancel();
        }
    }

    /// Resolves once the attempt is torn down or a reconnect is requested
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancellation scope of this attempt
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Close the underlying transport
    pub async fn close(&self, code: u16) {
        self.sink.close(code).await;
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.sink.is_open() && !self.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for ConnectionLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLink")
            .field("attempt", &self.attempt)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
