//! Heartbeat handlers (op 1, op 11)

use super::{HandlerContext, HandlerResult};
use crate::connection::ConnectionLink;

/// Handles heartbeat traffic from the server
pub struct HeartbeatHandler;

impl HeartbeatHandler {
    /// Heartbeat acknowledged; no phase change
    pub fn handle_ack(ctx: &HandlerContext, link: &ConnectionLink) -> HandlerResult {
        let latency = ctx.session.record_heartbeat_ack();

        tracing::trace!(
            attempt = link.attempt(),
            latency_ms = ?latency.map(|l| l.as_millis() as u64),
            outstanding = ctx.session.outstanding_heartbeats(),
            "Heartbeat acknowledged"
        );

        Ok(())
    }

    /// Server asked for a heartbeat; the armed loop keeps its own schedule
    pub fn handle_request(link: &ConnectionLink) -> HandlerResult {
        tracing::debug!(attempt = link.attempt(), "Server heartbeat request ignored");
        Ok(())
    }
}
