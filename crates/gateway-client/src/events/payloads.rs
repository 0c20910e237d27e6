//! Event payload definitions
//!
//! Dispatch payloads that are not a bare entity.

use crate::model::{Channel, Guild, Snowflake, User};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// READY event payload
///
/// Sent after a successful Identify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyEvent {
    /// Gateway protocol version
    #[serde(default)]
    pub v: u8,

    /// Current user
    pub user: User,

    /// Session ID for resuming
    pub session_id: String,

    /// Guilds the user is in (usually unavailable stubs at this point)
    #[serde(default)]
    pub guilds: Vec<Guild>,

    /// Direct and group conversations
    #[serde(default)]
    pub private_channels: Vec<Channel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_settings: Option<Value>,

    /// Gateway URL for resuming
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_gateway_url: Option<String>,
}

/// GUILD_DELETE event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildDeleteEvent {
    pub id: Snowflake,
    /// If true, this is a temporary outage; if false, the user left or the guild was deleted
    #[serde(default)]
    pub unavailable: bool,
}

/// MESSAGE_DELETE event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeleteEvent {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
}
