//! Hello handler (op 10)

use super::{HandlerContext, HandlerError, HandlerResult, IdentifyHandler};
use crate::connection::{ConnectionLink, Handshake};
use crate::protocol::HelloPayload;
use serde_json::Value;
use std::time::Duration;

/// Handles the server greeting
pub struct HelloHandler;

impl HelloHandler {
    /// Record the heartbeat interval, send Identify or Resume, then arm the heartbeat
    pub async fn handle(ctx: &HandlerContext, link: &ConnectionLink, data: Value) -> HandlerResult {
        let hello: HelloPayload =
            serde_json::from_value(data).map_err(|e| HandlerError::invalid_payload("Hello", e))?;

        if hello.heartbeat_interval == 0 {
            return Err(HandlerError::invalid_payload(
                "Hello",
                serde::de::Error::custom("heartbeat_interval must be positive"),
            ));
        }

        let interval = Duration::from_millis(hello.heartbeat_interval);
        let handshake = ctx.session.begin_handshake(interval)?;

        tracing::debug!(
            attempt = link.attempt(),
            interval_ms = hello.heartbeat_interval,
            "Hello received"
        );

        let sent = match handshake {
            Handshake::Identify => IdentifyHandler::identify(ctx, link).await,
            Handshake::Resume {
                session_id,
                sequence,
            } => IdentifyHandler::resume(ctx, link, session_id, sequence).await,
        };

        ctx.heartbeat.arm(ctx.session.clone(), link, interval);

        sent
    }
}
