//! Client error types

use crate::connection::SendError;
use gateway_common::ConfigError;
use thiserror::Error;

/// Errors returned by [`super::GatewayClient`]
#[derive(Debug, Error)]
pub enum ClientError {
    /// Construction arguments are unusable; not retried
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Client is already running")]
    AlreadyRunning,

    /// No open gateway connection to send on
    #[error("Not connected to the gateway")]
    NotConnected,

    #[error(transparent)]
    Send(#[from] SendError),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),
}
