//! Gateway events
//!
//! Dispatch events received from the gateway and their typed decode.

mod dispatch;
mod event_types;
mod payloads;

pub use dispatch::DispatchEvent;
pub use event_types::GatewayEventType;
pub use payloads::{GuildDeleteEvent, MessageDeleteEvent, ReadyEvent};
