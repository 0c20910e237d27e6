//! Connection management
//!
//! Transport abstraction, per-attempt link, session state machine, heartbeat
//! controller and reconnect backoff.

mod backoff;
mod heartbeat;
mod link;
mod session;
mod transport;
mod websocket;

#[cfg(any(test, feature = "testing"))]
pub mod mock;

pub use backoff::{random_between, Backoff};
pub use heartbeat::HeartbeatController;
pub use link::{ConnectionLink, SendError, NORMAL_CLOSE_CODE, RECONNECT_CLOSE_CODE};
pub use session::{Handshake, Phase, Session, SessionError, SessionSnapshot};
pub use transport::{Transport, TransportConnection, TransportError, TransportEvent, TransportSink};
pub use websocket::WebSocketTransport;
