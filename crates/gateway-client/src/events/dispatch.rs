//! Typed dispatch events
//!
//! Second-stage decode of a dispatch frame: the event name selects a decoder
//! from a lookup table, and the decoder turns the untyped `d` payload into one
//! variant of [`DispatchEvent`].

use super::{GatewayEventType, GuildDeleteEvent, MessageDeleteEvent, ReadyEvent};
use crate::model::{Channel, Guild, Message, User};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A decoded dispatch payload
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    Ready(Box<ReadyEvent>),
    Resumed,
    GuildCreate(Box<Guild>),
    GuildUpdate(Box<Guild>),
    GuildDelete(GuildDeleteEvent),
    ChannelCreate(Box<Channel>),
    ChannelUpdate(Box<Channel>),
    ChannelDelete(Box<Channel>),
    MessageCreate(Box<Message>),
    MessageUpdate(Box<Message>),
    MessageDelete(MessageDeleteEvent),
    UserUpdate(Box<User>),
}

type Decoder = fn(Value) -> Result<DispatchEvent, serde_json::Error>;

fn typed<T: DeserializeOwned>(data: Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(data)
}

const DECODERS: [(GatewayEventType, Decoder); 12] = [
    (GatewayEventType::Ready, |d| {
        typed(d).map(|e| DispatchEvent::Ready(Box::new(e)))
    }),
    (GatewayEventType::Resumed, |_| Ok(DispatchEvent::Resumed)),
    (GatewayEventType::GuildCreate, |d| {
        typed(d).map(|e| DispatchEvent::GuildCreate(Box::new(e)))
    }),
    (GatewayEventType::GuildUpdate, |d| {
        typed(d).map(|e| DispatchEvent::GuildUpdate(Box::new(e)))
    }),
    (GatewayEventType::GuildDelete, |d| {
        typed(d).map(DispatchEvent::GuildDelete)
    }),
    (GatewayEventType::ChannelCreate, |d| {
        typed(d).map(|e| DispatchEvent::ChannelCreate(Box::new(e)))
    }),
    (GatewayEventType::ChannelUpdate, |d| {
        typed(d).map(|e| DispatchEvent::ChannelUpdate(Box::new(e)))
    }),
    (GatewayEventType::ChannelDelete, |d| {
        typed(d).map(|e| DispatchEvent::ChannelDelete(Box::new(e)))
    }),
    (GatewayEventType::MessageCreate, |d| {
        typed(d).map(|e| DispatchEvent::MessageCreate(Box::new(e)))
    }),
    (GatewayEventType::MessageUpdate, |d| {
        typed(d).map(|e| DispatchEvent::MessageUpdate(Box::new(e)))
    }),
    (GatewayEventType::MessageDelete, |d| {
        typed(d).map(DispatchEvent::MessageDelete)
    }),
    (GatewayEventType::UserUpdate, |d| {
        typed(d).map(|e| DispatchEvent::UserUpdate(Box::new(e)))
    }),
];

impl DispatchEvent {
    /// Decode the payload of a dispatch frame
    ///
    /// Returns `None` for event names the client does not handle.
    pub fn decode(name: &str, data: Value) -> Option<Result<Self, serde_json::Error>> {
        let event_type = GatewayEventType::from_name(name)?;
        DECODERS
            .iter()
            .find(|(candidate, _)| *candidate == event_type)
            .map(|(_, decoder)| decoder(data))
    }

    /// The event type this variant was decoded from
    #[must_use]
    pub const fn event_type(&self) -> GatewayEventType {
        match self {
            Self::Ready(_) => GatewayEventType::Ready,
            Self::Resumed => GatewayEventType::Resumed,
            Self::GuildCreate(_) => GatewayEventType::GuildCreate,
            Self::GuildUpdate(_) => GatewayEventType::GuildUpdate,
            Self::GuildDelete(_) => GatewayEventType::GuildDelete,
            Self::ChannelCreate(_) => GatewayEventType::ChannelCreate,
            Self::ChannelUpdate(_) => GatewayEventType::ChannelUpdate,
            Self::ChannelDelete(_) => GatewayEventType::ChannelDelete,
            Self::MessageCreate(_) => GatewayEventType::MessageCreate,
            Self::MessageUpdate(_) => GatewayEventType::MessageUpdate,
            Self::MessageDelete(_) => GatewayEventType::MessageDelete,
            Self::UserUpdate(_) => GatewayEventType::UserUpdate,
        }
    }
}
