//! Remote entity model
//!
//! The subset of the remote object model the gateway client caches.

mod entities;
mod snowflake;

pub use entities::{Channel, ChannelKind, Guild, Merge, Message, User};
pub use snowflake::{Snowflake, SnowflakeParseError};
