//! Connection loop
//!
//! Opens a transport, pumps its frames through the codec into the attempt's
//! dispatch queue, tears the attempt down when the transport closes, and
//! decides whether and how soon to reconnect.

use super::events::ClientEvent;
use super::ClientInner;
use crate::connection::{
    Backoff, ConnectionLink, TransportConnection, TransportEvent, NORMAL_CLOSE_CODE,
    RECONNECT_CLOSE_CODE,
};
use crate::dispatch::DispatchQueue;
use crate::protocol::{decode, CloseAction, CloseCode};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Longest frame excerpt written to the log
const FRAME_PREVIEW_CHARS: usize = 256;

/// Why a connection attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// The client is shutting down
    Shutdown,
    /// A handler or the heartbeat asked for a fresh connection
    Reconnect,
    /// The transport closed or failed
    Remote,
}

struct AttemptOutcome {
    exit: Exit,
    code: Option<u16>,
    established: bool,
}

/// Run until shutdown or a non-recoverable close
pub(crate) async fn run(inner: Arc<ClientInner>) {
    let endpoint = inner.config.gateway.endpoint();
    let reconnect = &inner.config.reconnect;
    let mut backoff = Backoff::new(
        Duration::from_millis(reconnect.backoff_base_ms),
        Duration::from_millis(reconnect.backoff_max_ms),
    );

    while !inner.shutdown.is_cancelled() {
        let attempt = inner.session.begin_attempt();
        tracing::info!(attempt, url = %endpoint, "Connecting to gateway");

        let opened = tokio::select! {
            biased;

            () = inner.shutdown.cancelled() => break,
            result = inner.transport.open(&endpoint) => result,
        };

        let connection = match opened {
            Ok(connection) => connection,
            Err(e) => {
                inner.session.mark_closed();
                let delay = backoff.next_delay();
                tracing::warn!(
                    attempt,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Connection failed, retrying"
                );
                if !wait_or_shutdown(&inner.shutdown, delay).await {
                    break;
                }
                continue;
            }
        };

        let outcome = run_attempt(&inner, attempt, connection).await;
        if outcome.established {
            backoff.reset();
        }

        let close_code = outcome.code.and_then(CloseCode::from_u16);
        let action = CloseAction::for_code(outcome.code);
        let reconnect = match outcome.exit {
            Exit::Shutdown => false,
            Exit::Reconnect => true,
            Exit::Remote => action != CloseAction::Stop,
        };

        if action == CloseAction::Identify {
            inner.session.invalidate();
        }

        if reconnect || outcome.exit == Exit::Shutdown {
            tracing::info!(
                attempt,
                code = ?outcome.code,
                reason = ?close_code.map(CloseCode::description),
                reconnect,
                "Gateway connection closed"
            );
        } else {
            tracing::error!(
                attempt,
                code = ?outcome.code,
                reason = ?close_code.map(CloseCode::description),
                "Gateway closed the connection with a non-recoverable code"
            );
        }

        inner.notifier.emit(ClientEvent::ConnectionClosed {
            attempt,
            code: outcome.code,
            reconnect,
        });

        if !reconnect {
            break;
        }

        // A connection that never reached Ready is treated like a failed open
        if !outcome.established {
            let delay = backoff.next_delay();
            tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off before reconnect");
            if !wait_or_shutdown(&inner.shutdown, delay).await {
                break;
            }
        }
    }

    inner.session.mark_closed();
    tracing::info!("Gateway client stopped");
}

/// Drive one open connection until it ends
async fn run_attempt(inner: &ClientInner, attempt: u64, connection: TransportConnection) -> AttemptOutcome {
    let (sink, mut events) = connection.into_parts();
    let link = ConnectionLink::new(attempt, sink, inner.shutdown.child_token());
    let queue = DispatchQueue::new(attempt, inner.notifier.clone());

    if let Err(e) = inner.session.await_hello() {
        tracing::error!(attempt, error = %e, "Session not ready for a new connection");
    }
    *inner.active.lock() = Some(link.clone());

    tracing::info!(attempt, "Connected to gateway");
    inner.notifier.emit(ClientEvent::ConnectionOpened { attempt });

    let (exit, code) = loop {
        tokio::select! {
            biased;

            () = inner.shutdown.cancelled() => break (Exit::Shutdown, None),
            () = link.cancelled() => break (Exit::Reconnect, None),

            event = events.recv() => match event {
                Some(TransportEvent::Message(raw)) => {
                    tracing::trace!(attempt, frame = %preview(&raw), "Frame received");

                    match decode(&raw) {
                        Ok(envelope) => {
                            let label = envelope.label();
                            let work = inner.router.route(link.clone(), envelope);
                            if let Err(e) = queue.enqueue(label, work) {
                                tracing::error!(attempt, error = %e, "Failed to enqueue frame");
                            }
                        }
                        Err(e) => {
                            tracing::warn!(
                                attempt,
                                error = %e,
                                frame = %preview(&raw),
                                "Dropping malformed frame"
                            );
                        }
                    }
                }
                Some(TransportEvent::Error(e)) => {
                    tracing::warn!(attempt, error = %e, "Transport error");
                }
                Some(TransportEvent::Closed(code)) => break (Exit::Remote, code),
                None => break (Exit::Remote, None),
            },
        }
    };

    // Stop the heartbeat and any control-plane wait, reject late work
    link.token().cancel();
    inner.heartbeat.disarm();
    queue.close();
    inner.active.lock().take();

    match exit {
        Exit::Shutdown => link.close(NORMAL_CLOSE_CODE).await,
        Exit::Reconnect => link.close(RECONNECT_CLOSE_CODE).await,
        Exit::Remote => {}
    }

    let established = inner.session.mark_closed();

    AttemptOutcome {
        exit,
        code,
        established,
    }
}

/// Sleep for `delay`; false if shutdown was requested first
async fn wait_or_shutdown(shutdown: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        biased;

        () = shutdown.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

fn preview(raw: &str) -> &str {
    match raw.char_indices().nth(FRAME_PREVIEW_CHARS) {
        Some((end, _)) => &raw[..end],
        None => raw,
    }
}
