//! Identify (op 2) and Resume (op 6) senders

use super::{HandlerContext, HandlerResult};
use crate::connection::ConnectionLink;
use crate::protocol::{IdentifyPayload, OpCode, ResumePayload};

/// Sends the handshake frames
pub struct IdentifyHandler;

impl IdentifyHandler {
    /// Start a new session
    pub async fn identify(ctx: &HandlerContext, link: &ConnectionLink) -> HandlerResult {
        let payload = IdentifyPayload {
            token: ctx.identity.token.clone(),
            properties: ctx.identity.properties.clone(),
            intents: ctx.identity.intents,
        };

        link.send(OpCode::Identify, &payload).await?;

        tracing::info!(
            attempt = link.attempt(),
            token = %ctx.identity.token,
            intents = ?ctx.identity.intents,
            "Identify sent"
        );

        Ok(())
    }

    /// Re-attach to `session_id`, replaying from `sequence`
    pub async fn resume(
        ctx: &HandlerContext,
        link: &ConnectionLink,
        session_id: String,
        sequence: u64,
    ) -> HandlerResult {
        let payload = ResumePayload {
            token: ctx.identity.token.clone(),
            session_id,
            seq: sequence,
        };

        link.send(OpCode::Resume, &payload).await?;

        tracing::info!(
            attempt = link.attempt(),
            session_id = %payload.session_id,
            sequence,
            "Resume sent"
        );

        Ok(())
    }
}
