//! Remote entities carried by dispatch payloads
//!
//! Only the fields the client caches are modelled; everything else in a
//! payload is ignored on decode. Fields a partial update may omit are `Option`s.

use super::Snowflake;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Insert-if-absent-else-merge update rule for cached entities
pub trait Merge {
    /// Fold a newer (possibly partial) copy into `self`
    fn merge(&mut self, update: Self);
}

fn merge_opt<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// A user account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Snowflake,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl Merge for User {
    fn merge(&mut self, update: Self) {
        merge_opt(&mut self.username, update.username);
        merge_opt(&mut self.discriminator, update.discriminator);
        merge_opt(&mut self.avatar, update.avatar);
        self.bot = update.bot;
    }
}

/// Channel kinds the client distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    GuildText,
    Direct,
    GuildVoice,
    Group,
    GuildCategory,
    Other(u8),
}

impl ChannelKind {
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::GuildText,
            1 => Self::Direct,
            2 => Self::GuildVoice,
            3 => Self::Group,
            4 => Self::GuildCategory,
            other => Self::Other(other),
        }
    }

    /// Direct and group conversations live outside any guild
    #[must_use]
    pub const fn is_private(self) -> bool {
        matches!(self, Self::Direct | Self::Group)
    }
}

/// A guild channel or a private conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Snowflake,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub position: Option<i32>,
    #[serde(default)]
    pub last_message_id: Option<Snowflake>,
    #[serde(default)]
    pub recipients: Vec<User>,
}

impl Channel {
    #[must_use]
    pub fn kind(&self) -> ChannelKind {
        ChannelKind::from_u8(self.kind)
    }
}

impl Merge for Channel {
    fn merge(&mut self, update: Self) {
        self.kind = update.kind;
        merge_opt(&mut self.guild_id, update.guild_id);
        merge_opt(&mut self.name, update.name);
        merge_opt(&mut self.topic, update.topic);
        merge_opt(&mut self.position, update.position);
        merge_opt(&mut self.last_message_id, update.last_message_id);
        if !update.recipients.is_empty() {
            self.recipients = update.recipients;
        }
    }
}

/// A guild (server)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guild {
    pub id: Snowflake,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub owner_id: Option<Snowflake>,
    #[serde(default)]
    pub member_count: Option<u64>,
    #[serde(default)]
    pub unavailable: bool,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

impl Merge for Guild {
    fn merge(&mut self, update: Self) {
        merge_opt(&mut self.name, update.name);
        merge_opt(&mut self.icon, update.icon);
        merge_opt(&mut self.owner_id, update.owner_id);
        merge_opt(&mut self.member_count, update.member_count);
        self.unavailable = update.unavailable;

        for channel in update.channels {
            match self.channels.iter_mut().find(|c| c.id == channel.id) {
                Some(existing) => existing.merge(channel),
                None => self.channels.push(channel),
            }
        }
    }
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub author: Option<User>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub edited_timestamp: Option<DateTime<Utc>>,
}

impl Message {
    /// Placeholder for a message known only by id
    #[must_use]
    pub fn stub(id: Snowflake, channel_id: Snowflake, guild_id: Option<Snowflake>) -> Self {
        Self {
            id,
            channel_id,
            guild_id,
            author: None,
            content: None,
            timestamp: None,
            edited_timestamp: None,
        }
    }
}

impl Merge for Message {
    fn merge(&mut self, update: Self) {
        merge_opt(&mut self.guild_id, update.guild_id);
        merge_opt(&mut self.content, update.content);
        merge_opt(&mut self.timestamp, update.timestamp);
        merge_opt(&mut self.edited_timestamp, update.edited_timestamp);
        match (&mut self.author, update.author) {
            (Some(existing), Some(author)) => existing.merge(author),
            (slot @ None, Some(author)) => *slot = Some(author),
            (_, None) => {}
        }
    }
}
