//! Heartbeat controller
//!
//! One liveness loop per connection attempt. The loop sends a heartbeat
//! carrying the last sequence number, then sleeps for the interval advertised
//! in Hello, until it is disarmed or the attempt's link is cancelled.

use super::link::ConnectionLink;
use super::session::Session;
use crate::protocol::OpCode;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct ArmedHeartbeat {
    attempt: u64,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the heartbeat loop of the current connection attempt
pub struct HeartbeatController {
    armed: Mutex<Option<ArmedHeartbeat>>,
    max_missed: Option<u32>,
}

impl HeartbeatController {
    /// `max_missed`: request a reconnect once this many heartbeats are unacknowledged
    #[must_use]
    pub fn new(max_missed: Option<u32>) -> Self {
        Self {
            armed: Mutex::new(None),
            max_missed: max_missed.filter(|n| *n > 0),
        }
    }

    /// Start the loop for `link`, stopping any previously armed loop first
    ///
    /// A link that is already torn down, or older than the armed attempt, is
    /// ignored; late work from a dead attempt must not stop the live loop.
    pub fn arm(&self, session: Arc<Session>, link: &ConnectionLink, interval: Duration) {
        let mut armed = self.armed.lock();

        if link.is_cancelled() {
            tracing::debug!(attempt = link.attempt(), "Not arming heartbeat for closed attempt");
            return;
        }
        if let Some(current) = armed.as_ref().filter(|h| h.attempt > link.attempt()) {
            tracing::debug!(
                attempt = link.attempt(),
                armed = current.attempt,
                "Not arming heartbeat for stale attempt"
            );
            return;
        }

        if let Some(previous) = armed.take() {
            previous.stop.cancel();
            tracing::debug!(attempt = previous.attempt, "Replacing armed heartbeat");
        }

        let stop = link.token().child_token();
        let task = tokio::spawn(heartbeat_loop(
            session,
            link.clone(),
            interval,
            stop.clone(),
            self.max_missed,
        ));

        tracing::debug!(
            attempt = link.attempt(),
            interval_ms = interval.as_millis() as u64,
            "Heartbeat armed"
        );

        *armed = Some(ArmedHeartbeat {
            attempt: link.attempt(),
            stop,
            task,
        });
    }

    /// Stop the loop; no heartbeat is sent afterwards
    pub fn disarm(&self) {
        if let Some(heartbeat) = self.armed.lock().take() {
            heartbeat.stop.cancel();
            tracing::debug!(attempt = heartbeat.attempt, "Heartbeat disarmed");
        }
    }

    /// Whether a loop is running for `attempt`
    #[must_use]
    pub fn is_armed_for(&self, attempt: u64) -> bool {
        self.armed.lock().as_ref().is_some_and(|heartbeat| {
            heartbeat.attempt == attempt
                && !heartbeat.stop.is_cancelled()
                && !heartbeat.task.is_finished()
        })
    }
}

impl Drop for HeartbeatController {
    fn drop(&mut self) {
        self.disarm();
    }
}

async fn heartbeat_loop(
    session: Arc<Session>,
    link: ConnectionLink,
    interval: Duration,
    stop: CancellationToken,
    max_missed: Option<u32>,
) {
    loop {
        if let Some(limit) = max_missed {
            let outstanding = session.outstanding_heartbeats();
            if outstanding >= limit {
                tracing::warn!(
                    attempt = link.attempt(),
                    outstanding,
                    "Heartbeats unacknowledged, reconnecting"
                );
                link.request_reconnect();
                return;
            }
        }

        let sequence = session.last_sequence();

        tokio::select! {
            biased;

            () = stop.cancelled() => return,

            result = async {
                session.record_heartbeat_sent();
                link.send(OpCode::Heartbeat, &sequence).await
            } => {
                match result {
                    Ok(()) => {
                        tracing::trace!(attempt = link.attempt(), sequence = ?sequence, "Heartbeat sent");
                    }
                    Err(e) => {
                        session.rollback_heartbeat();
                        tracing::warn!(attempt = link.attempt(), error = %e, "Failed to send heartbeat");
                    }
                }
            }
        }

        tokio::select! {
            biased;

            () = stop.cancelled() => return,
            () = tokio::time::sleep(interval) => {}
        }
    }
}
