//! # gateway-client
//!
//! Persistent, resumable client for a Discord-style real-time push gateway.
//!
//! The client keeps one WebSocket connection open, answers the server's
//! heartbeat schedule, identifies or resumes its session after every
//! reconnect, and handles inbound frames strictly in arrival order.

pub mod cache;
pub mod client;
pub mod connection;
pub mod dispatch;
pub mod events;
pub mod handlers;
pub mod model;
pub mod protocol;

pub use cache::EntityCache;
pub use client::{ClientError, ClientEvent, GatewayClient, Notifier};
pub use connection::{Phase, SessionSnapshot, Transport, WebSocketTransport};
pub use events::{DispatchEvent, GatewayEventType};
pub use protocol::{CloseAction, CloseCode, OpCode, StatusUpdatePayload};
