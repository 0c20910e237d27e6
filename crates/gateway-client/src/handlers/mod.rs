//! Op code handlers
//!
//! The router turns each decoded envelope into a unit of work for the
//! dispatch queue, picking the handler by op code and, for dispatches, by
//! event name.

mod context;
mod dispatch;
mod error;
mod heartbeat;
mod hello;
mod identify;
mod invalid_session;

pub use context::{HandlerContext, Identity};
pub use dispatch::DispatchHandler;
pub use error::{HandlerError, HandlerResult};
pub use heartbeat::HeartbeatHandler;
pub use hello::HelloHandler;
pub use identify::IdentifyHandler;
pub use invalid_session::InvalidSessionHandler;

use crate::connection::ConnectionLink;
use crate::dispatch::UnitOfWork;
use crate::protocol::{Envelope, OpCode};
use futures::FutureExt;
use std::sync::Arc;

/// Maps envelopes to handlers
#[derive(Clone)]
pub struct EventRouter {
    ctx: Arc<HandlerContext>,
}

impl EventRouter {
    #[must_use]
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }

    #[must_use]
    pub fn context(&self) -> &Arc<HandlerContext> {
        &self.ctx
    }

    /// Build the unit of work for one inbound envelope
    ///
    /// The unit does nothing if its connection attempt has been torn down by
    /// the time it runs.
    pub fn route(&self, link: ConnectionLink, envelope: Envelope) -> UnitOfWork {
        let ctx = self.ctx.clone();

        async move {
            if link.is_cancelled() || ctx.session.is_closed() {
                return Err(HandlerError::Cancelled);
            }

            match envelope.op() {
                OpCode::Hello => HelloHandler::handle(&ctx, &link, envelope.into_data()).await,
                OpCode::HeartbeatAck => HeartbeatHandler::handle_ack(&ctx, &link),
                OpCode::Heartbeat => HeartbeatHandler::handle_request(&link),
                OpCode::InvalidSession => {
                    InvalidSessionHandler::handle(&ctx, &link, envelope.data()).await
                }
                OpCode::Reconnect => {
                    tracing::info!(attempt = link.attempt(), "Server requested reconnect");
                    link.request_reconnect();
                    Ok(())
                }
                OpCode::Dispatch => DispatchHandler::handle(&ctx, &link, envelope).await,
                op => {
                    tracing::debug!(attempt = link.attempt(), op = %op, "Ignoring op code");
                    Ok(())
                }
            }
        }
        .boxed()
    }
}
