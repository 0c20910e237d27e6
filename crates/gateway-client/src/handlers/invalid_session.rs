//! Invalid session handler (op 9)

use super::{HandlerContext, HandlerError, HandlerResult, IdentifyHandler};
use crate::connection::{random_between, ConnectionLink};
use serde_json::Value;

/// Handles the server rejecting the session
pub struct InvalidSessionHandler;

impl InvalidSessionHandler {
    /// Forget the session, wait a random delay, then identify afresh
    ///
    /// The wait holds the dispatch queue, so exactly one Identify follows. The
    /// server's "resumable" flag is logged but not acted on.
    pub async fn handle(ctx: &HandlerContext, link: &ConnectionLink, data: &Value) -> HandlerResult {
        let resumable = data.as_bool().unwrap_or(false);
        let previous = ctx.session.invalidate();

        let (min, max) = ctx.invalid_session_delay;
        let delay = random_between(min, max);

        tracing::info!(
            attempt = link.attempt(),
            resumable,
            session_id = ?previous,
            delay_ms = delay.as_millis() as u64,
            "Session invalidated, identifying after delay"
        );

        tokio::select! {
            biased;

            () = link.cancelled() => return Err(HandlerError::Cancelled),
            () = tokio::time::sleep(delay) => {}
        }

        ctx.session.begin_reidentify()?;
        IdentifyHandler::identify(ctx, link).await
    }
}
