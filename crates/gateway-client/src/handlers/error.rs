//! Handler error types

use crate::connection::{SendError, SessionError};
use thiserror::Error;

/// Failure of one unit of work
///
/// Reported to the fault sink; never fatal to the connection.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Payload did not match the shape expected for its op code or event
    #[error("Invalid payload for {context}: {source}")]
    InvalidPayload {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Outbound frame could not be sent
    #[error("Send failed: {0}")]
    Send(#[from] SendError),

    /// Session state machine rejected the step
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// The handler panicked
    #[error("Handler panicked: {0}")]
    Panicked(String),

    /// The connection attempt was torn down while the handler waited
    #[error("Connection attempt cancelled")]
    Cancelled,
}

impl HandlerError {
    pub fn invalid_payload(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::InvalidPayload {
            context: context.into(),
            source,
        }
    }
}

/// Handler result type
pub type HandlerResult<T = ()> = Result<T, HandlerError>;
