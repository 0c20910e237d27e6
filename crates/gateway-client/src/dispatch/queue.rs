//! Ordered dispatch queue
//!
//! Inbound frames become units of work that may suspend. The queue runs them
//! strictly in enqueue order: unit N finishes before unit N+1 starts, and at
//! most one drain task exists at a time. Appending a unit and deciding whether
//! to start a drain happen under a single lock acquisition, so racing enqueues
//! can neither start two drains nor strand a unit with no drain running.

use crate::handlers::HandlerError;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;

/// One queued piece of work
pub type UnitOfWork = BoxFuture<'static, Result<(), HandlerError>>;

/// A unit of work failed
#[derive(Debug)]
pub struct HandlerFault {
    pub attempt: u64,
    pub label: String,
    pub error: HandlerError,
}

/// Receives failures of queued units
pub trait FaultSink: Send + Sync {
    fn report(&self, fault: HandlerFault);
}

/// Queue rejected a unit
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The connection attempt owning the queue has been torn down
    #[error("Dispatch queue is closed")]
    Closed,
}

struct QueuedUnit {
    label: String,
    work: UnitOfWork,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueuedUnit>,
    draining: bool,
    closed: bool,
}

struct QueueInner {
    attempt: u64,
    state: Mutex<QueueState>,
    faults: Arc<dyn FaultSink>,
}

/// FIFO work queue for one connection attempt
#[derive(Clone)]
pub struct DispatchQueue {
    inner: Arc<QueueInner>,
}

impl DispatchQueue {
    #[must_use]
    pub fn new(attempt: u64, faults: Arc<dyn FaultSink>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                attempt,
                state: Mutex::new(QueueState::default()),
                faults,
            }),
        }
    }

    /// Append a unit; starts a drain if none is running
    pub fn enqueue(&self, label: impl Into<String>, work: UnitOfWork) -> Result<(), QueueError> {
        let start_drain = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(QueueError::Closed);
            }

            state.pending.push_back(QueuedUnit {
                label: label.into(),
                work,
            });
            !std::mem::replace(&mut state.draining, true)
        };

        if start_drain {
            tokio::spawn(drain(self.inner.clone()));
        }

        Ok(())
    }

    /// Reject further units and drop the pending ones
    ///
    /// A unit that is already running is allowed to finish. Returns the number
    /// of units dropped.
    pub fn close(&self) -> usize {
        let dropped = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            std::mem::take(&mut state.pending)
        };

        if !dropped.is_empty() {
            tracing::debug!(
                attempt = self.inner.attempt,
                dropped = dropped.len(),
                "Dropped pending units on close"
            );
        }
        dropped.len()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Units waiting to run (the running one excluded)
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.inner.state.lock().draining
    }
}

async fn drain(inner: Arc<QueueInner>) {
    loop {
        let unit = {
            let mut state = inner.state.lock();
            match state.pending.pop_front() {
                Some(unit) => unit,
                None => {
                    state.draining = false;
                    return;
                }
            }
        };

        let QueuedUnit { label, work } = unit;
        let outcome = AssertUnwindSafe(work).catch_unwind().await;

        let error = match outcome {
            Ok(Ok(())) => continue,
            Ok(Err(HandlerError::Cancelled)) => {
                tracing::debug!(attempt = inner.attempt, unit = %label, "Unit cancelled");
                continue;
            }
            Ok(Err(error)) => error,
            Err(panic) => HandlerError::Panicked(panic_message(panic.as_ref())),
        };

        tracing::warn!(attempt = inner.attempt, unit = %label, error = %error, "Handler failed");
        inner.faults.report(HandlerFault {
            attempt: inner.attempt,
            label,
            error,
        });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
