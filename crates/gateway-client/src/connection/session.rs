//! Session state machine
//!
//! Owns the connection phase, the session identifier and the last sequence
//! number, plus the heartbeat bookkeeping. Other components never touch the
//! record directly: they call the mutators below or read a [`SessionSnapshot`].
//!
//! Phases:
//!
//! ```text
//! Closed -> Connecting -> AwaitingHello -> Identifying -> Ready -> Dispatching
//!                                       \-> Resuming  ----/
//! any -> Closed
//! ```

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Connection phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    /// Transport is being opened
    Connecting,
    /// Transport open, waiting for the server greeting
    AwaitingHello,
    /// Identify sent, waiting for READY
    Identifying,
    /// Resume sent, waiting for RESUMED
    Resuming,
    /// Session established
    Ready,
    /// Steady state, dispatch events flowing
    Dispatching,
    /// No transport
    Closed,
}

impl Phase {
    /// Whether `next` is a legal successor of `self`
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use Phase::{AwaitingHello, Closed, Connecting, Dispatching, Identifying, Ready, Resuming};

        matches!(
            (self, next),
            (_, Closed)
                | (Closed, Connecting)
                | (Connecting, AwaitingHello)
                | (AwaitingHello, Identifying | Resuming)
                | (Identifying | Resuming | Ready | Dispatching, Identifying)
                | (Identifying | Resuming, Ready)
                | (Ready, Dispatching)
        )
    }

    /// Whether a session has been established on the current connection
    #[must_use]
    pub const fn is_established(self) -> bool {
        matches!(self, Self::Ready | Self::Dispatching)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
            Self::Ready => "ready",
            Self::Dispatching => "dispatching",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Illegal use of the state machine
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Illegal phase transition {from} -> {to}")]
    IllegalTransition { from: Phase, to: Phase },

    #[error("Hello received in phase {0}")]
    UnexpectedHello(Phase),
}

/// How to (re-)establish the session after Hello
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    Identify,
    Resume { session_id: String, sequence: u64 },
}

/// Immutable view of the session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub session_id: Option<String>,
    pub last_sequence: Option<u64>,
    pub heartbeat_interval: Option<Duration>,
    pub outstanding_heartbeats: u32,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub latency: Option<Duration>,
    pub attempt: u64,
}

#[derive(Debug)]
struct SessionRecord {
    phase: Phase,
    session_id: Option<String>,
    last_sequence: Option<u64>,
    heartbeat_interval: Option<Duration>,
    attempt: u64,
    established: bool,
}

impl SessionRecord {
    fn transition(&mut self, to: Phase) -> Result<(), SessionError> {
        if !self.phase.can_transition_to(to) {
            return Err(SessionError::IllegalTransition {
                from: self.phase,
                to,
            });
        }

        tracing::trace!(attempt = self.attempt, from = %self.phase, to = %to, "Phase transition");
        self.phase = to;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct HeartbeatTiming {
    last_sent: Option<Instant>,
    last_sent_at: Option<DateTime<Utc>>,
    latency: Option<Duration>,
}

/// Session state for one logical gateway session
#[derive(Debug)]
pub struct Session {
    record: Mutex<SessionRecord>,
    outstanding: AtomicU32,
    timing: Mutex<HeartbeatTiming>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self {
            record: Mutex::new(SessionRecord {
                phase: Phase::Closed,
                session_id: None,
                last_sequence: None,
                heartbeat_interval: None,
                attempt: 0,
                established: false,
            }),
            outstanding: AtomicU32::new(0),
            timing: Mutex::new(HeartbeatTiming::default()),
        }
    }

    // === Lifecycle ===

    /// Start a new connection attempt, returning its number
    ///
    /// Session id and sequence carry over so the attempt can resume.
    pub fn begin_attempt(&self) -> u64 {
        let attempt = {
            let mut record = self.record.lock();
            record.phase = Phase::Connecting;
            record.heartbeat_interval = None;
            record.established = false;
            record.attempt += 1;
            record.attempt
        };

        self.outstanding.store(0, Ordering::Release);
        *self.timing.lock() = HeartbeatTiming::default();

        tracing::debug!(attempt, "Connection attempt started");
        attempt
    }

    /// Transport is open; wait for Hello
    pub fn await_hello(&self) -> Result<(), SessionError> {
        self.record.lock().transition(Phase::AwaitingHello)
    }

    /// Hello received: record the interval and decide between identify and resume
    ///
    /// The interval is fixed for the rest of the attempt; a second Hello is rejected.
    pub fn begin_handshake(&self, interval: Duration) -> Result<Handshake, SessionError> {
        let mut record = self.record.lock();

        if record.phase != Phase::AwaitingHello || record.heartbeat_interval.is_some() {
            return Err(SessionError::UnexpectedHello(record.phase));
        }

        record.heartbeat_interval = Some(interval);

        match record.session_id.clone() {
            Some(session_id) => {
                record.transition(Phase::Resuming)?;
                Ok(Handshake::Resume {
                    session_id,
                    sequence: record.last_sequence.unwrap_or(0),
                })
            }
            None => {
                record.transition(Phase::Identifying)?;
                record.last_sequence = None;
                Ok(Handshake::Identify)
            }
        }
    }

    /// Invalid session backoff elapsed; identify afresh
    pub fn begin_reidentify(&self) -> Result<(), SessionError> {
        let mut record = self.record.lock();
        record.transition(Phase::Identifying)?;
        record.last_sequence = None;
        Ok(())
    }

    /// READY received
    pub fn mark_ready(&self, session_id: String) -> Result<(), SessionError> {
        let mut record = self.record.lock();
        record.transition(Phase::Ready)?;
        record.session_id = Some(session_id);
        record.established = true;
        Ok(())
    }

    /// RESUMED received; returns the resumed session id
    pub fn mark_resumed(&self) -> Result<Option<String>, SessionError> {
        let mut record = self.record.lock();
        if record.phase != Phase::Resuming {
            return Err(SessionError::IllegalTransition {
                from: record.phase,
                to: Phase::Ready,
            });
        }

        record.transition(Phase::Ready)?;
        record.established = true;
        Ok(record.session_id.clone())
    }

    /// A data-plane event was handled; Ready settles into Dispatching
    pub fn record_dispatch(&self) {
        let mut record = self.record.lock();
        if record.phase == Phase::Ready {
            // Ready -> Dispatching is always legal
            let _ = record.transition(Phase::Dispatching);
        }
    }

    /// Record a dispatch sequence number
    ///
    /// Gaps are accepted. A value lower than the current one is ignored so the
    /// sequence never moves backwards within a session.
    pub fn record_sequence(&self, sequence: u64) -> bool {
        let mut record = self.record.lock();

        match record.last_sequence {
            Some(last) if sequence < last => {
                tracing::warn!(
                    attempt = record.attempt,
                    sequence,
                    last_sequence = last,
                    "Ignoring out-of-order sequence number"
                );
                false
            }
            _ => {
                record.last_sequence = Some(sequence);
                true
            }
        }
    }

    /// The server invalidated the session: forget the id and sequence
    pub fn invalidate(&self) -> Option<String> {
        let mut record = self.record.lock();
        record.last_sequence = None;
        record.session_id.take()
    }

    /// Transport gone; returns whether the attempt had established a session
    pub fn mark_closed(&self) -> bool {
        let mut record = self.record.lock();
        // Any phase may close
        let _ = record.transition(Phase::Closed);
        std::mem::take(&mut record.established)
    }

    // === Heartbeat bookkeeping ===

    /// A heartbeat is about to be sent; returns the outstanding count including it
    pub fn record_heartbeat_sent(&self) -> u32 {
        {
            let mut timing = self.timing.lock();
            timing.last_sent = Some(Instant::now());
            timing.last_sent_at = Some(Utc::now());
        }
        self.outstanding.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Undo [`Self::record_heartbeat_sent`] after a failed send
    pub fn rollback_heartbeat(&self) {
        self.decrement_outstanding();
    }

    /// Heartbeat acknowledged; returns the latency since the most recent send
    pub fn record_heartbeat_ack(&self) -> Option<Duration> {
        self.decrement_outstanding();

        let mut timing = self.timing.lock();
        let latency = timing.last_sent.map(|sent| sent.elapsed());
        if latency.is_some() {
            timing.latency = latency;
        }
        latency
    }

    fn decrement_outstanding(&self) {
        let _ = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    // === Reads ===

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.record.lock().phase
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.phase() == Phase::Closed
    }

    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.record.lock().session_id.clone()
    }

    #[must_use]
    pub fn last_sequence(&self) -> Option<u64> {
        self.record.lock().last_sequence
    }

    #[must_use]
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.record.lock().heartbeat_interval
    }

    #[must_use]
    pub fn attempt(&self) -> u64 {
        self.record.lock().attempt
    }

    #[must_use]
    pub fn outstanding_heartbeats(&self) -> u32 {
        self.outstanding.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.timing.lock().latency
    }

    /// Consistent copy of the whole session state
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let record = self.record.lock();
        let timing = self.timing.lock();

        SessionSnapshot {
            phase: record.phase,
            session_id: record.session_id.clone(),
            last_sequence: record.last_sequence,
            heartbeat_interval: record.heartbeat_interval,
            outstanding_heartbeats: self.outstanding.load(Ordering::Acquire),
            last_heartbeat_at: timing.last_sent_at,
            latency: timing.latency,
            attempt: record.attempt,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
