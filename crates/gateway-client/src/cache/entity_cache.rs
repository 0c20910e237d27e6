//! In-memory cache of remote entities
//!
//! Uses `DashMap` for concurrent reads from the application while the dispatch
//! drain applies updates. Every update follows insert-if-absent-else-merge.

use crate::model::{Channel, Guild, Merge, Message, Snowflake, User};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::VecDeque;

/// Insert `value` or merge it into the existing entry, returning the result
fn upsert<T: Merge + Clone>(map: &DashMap<Snowflake, T>, id: Snowflake, value: T) -> T {
    match map.entry(id) {
        Entry::Occupied(mut entry) => {
            entry.get_mut().merge(value);
            entry.get().clone()
        }
        Entry::Vacant(entry) => entry.insert(value).value().clone(),
    }
}

/// Cache of guilds, channels, users and recent messages
pub struct EntityCache {
    guilds: DashMap<Snowflake, Guild>,
    channels: DashMap<Snowflake, Channel>,
    users: DashMap<Snowflake, User>,
    messages: DashMap<Snowflake, VecDeque<Message>>,
    current_user: RwLock<Option<User>>,
    messages_per_channel: usize,
}

impl EntityCache {
    /// Create an empty cache keeping up to `messages_per_channel` messages per channel
    #[must_use]
    pub fn new(messages_per_channel: usize) -> Self {
        Self {
            guilds: DashMap::new(),
            channels: DashMap::new(),
            users: DashMap::new(),
            messages: DashMap::new(),
            current_user: RwLock::new(None),
            messages_per_channel,
        }
    }

    // === Users ===

    /// Insert or merge a user
    pub fn upsert_user(&self, user: User) -> User {
        upsert(&self.users, user.id, user)
    }

    /// Get a user by ID
    pub fn user(&self, id: Snowflake) -> Option<User> {
        self.users.get(&id).map(|r| r.clone())
    }

    /// Record the account this session is logged in as
    pub fn set_current_user(&self, user: User) -> User {
        let user = {
            let mut current = self.current_user.write();
            let user = match current.take() {
                Some(mut existing) if existing.id == user.id => {
                    existing.merge(user);
                    existing
                }
                _ => user,
            };
            *current = Some(user.clone());
            user
        };

        self.upsert_user(user)
    }

    /// The account this session is logged in as
    pub fn current_user(&self) -> Option<User> {
        self.current_user.read().clone()
    }

    // === Guilds ===

    /// Insert or merge a guild and register its channels
    pub fn upsert_guild(&self, mut guild: Guild) -> Guild {
        for channel in &mut guild.channels {
            channel.guild_id.get_or_insert(guild.id);
        }

        let channels = guild.channels.clone();
        let merged = upsert(&self.guilds, guild.id, guild);

        for channel in channels {
            self.store_channel(channel);
        }

        tracing::trace!(guild_id = %merged.id, "Guild cached");
        merged
    }

    /// Remove a guild, or mark it unavailable during an outage
    ///
    /// A removed guild takes its channels and their messages with it.
    pub fn remove_guild(&self, id: Snowflake, unavailable: bool) -> Option<Guild> {
        if unavailable {
            return self.guilds.get_mut(&id).map(|mut guild| {
                guild.unavailable = true;
                guild.clone()
            });
        }

        let (_, guild) = self.guilds.remove(&id)?;
        self.channels.retain(|_, channel| channel.guild_id != Some(id));
        for channel in &guild.channels {
            self.messages.remove(&channel.id);
        }

        tracing::trace!(guild_id = %id, "Guild removed");
        Some(guild)
    }

    /// Get a guild by ID
    pub fn guild(&self, id: Snowflake) -> Option<Guild> {
        self.guilds.get(&id).map(|r| r.clone())
    }

    /// Number of cached guilds
    pub fn guild_count(&self) -> usize {
        self.guilds.len()
    }

    // === Channels ===

    /// Insert or merge a channel
    ///
    /// Recipients are merged into the user cache and replaced by the canonical copies;
    /// a guild channel is also merged into its guild's channel list.
    pub fn upsert_channel(&self, channel: Channel) -> Channel {
        if let Some(guild_id) = channel.guild_id {
            if let Some(mut guild) = self.guilds.get_mut(&guild_id) {
                match guild.channels.iter_mut().find(|c| c.id == channel.id) {
                    Some(existing) => existing.merge(channel.clone()),
                    None => guild.channels.push(channel.clone()),
                }
            }
        }

        self.store_channel(channel)
    }

    fn store_channel(&self, mut channel: Channel) -> Channel {
        channel.recipients = std::mem::take(&mut channel.recipients)
            .into_iter()
            .map(|user| self.upsert_user(user))
            .collect();

        upsert(&self.channels, channel.id, channel)
    }

    /// Remove a channel and its cached messages
    pub fn remove_channel(&self, id: Snowflake) -> Option<Channel> {
        let (_, channel) = self.channels.remove(&id)?;
        self.messages.remove(&id);

        if let Some(guild_id) = channel.guild_id {
            if let Some(mut guild) = self.guilds.get_mut(&guild_id) {
                guild.channels.retain(|c| c.id != id);
            }
        }

        Some(channel)
    }

    /// Get a channel by ID
    pub fn channel(&self, id: Snowflake) -> Option<Channel> {
        self.channels.get(&id).map(|r| r.clone())
    }

    /// Number of cached channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    // === Messages ===

    /// Append a new message to its channel's history
    ///
    /// Messages without a channel are not cached. The oldest message is
    /// evicted once the channel holds `messages_per_channel` entries.
    pub fn insert_message(&self, mut message: Message) -> Option<Message> {
        if message.channel_id.is_zero() {
            return None;
        }

        if let Some(author) = message.author.take() {
            message.author = Some(self.upsert_user(author));
        }

        if self.messages_per_channel == 0 {
            return Some(message);
        }

        let mut history = self.messages.entry(message.channel_id).or_default();
        match history.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => existing.merge(message.clone()),
            None => {
                history.push_back(message.clone());
                while history.len() > self.messages_per_channel {
                    history.pop_front();
                }
            }
        }
        drop(history);

        if let Some(mut channel) = self.channels.get_mut(&message.channel_id) {
            channel.last_message_id = Some(message.id);
        }

        Some(message)
    }

    /// Merge an edit into a cached message, caching it if it was unknown
    pub fn update_message(&self, message: Message) -> Option<Message> {
        let channel_id = message.channel_id;
        let id = message.id;

        let merged = self.messages.get_mut(&channel_id).and_then(|mut history| {
            let existing = history.iter_mut().find(|m| m.id == id)?;
            existing.merge(message.clone());
            Some(existing.clone())
        });

        merged.or_else(|| self.insert_message(message))
    }

    /// Remove a message, returning it if it was cached
    pub fn remove_message(&self, channel_id: Snowflake, id: Snowflake) -> Option<Message> {
        let mut history = self.messages.get_mut(&channel_id)?;
        let index = history.iter().position(|m| m.id == id)?;
        history.remove(index)
    }

    /// Get a cached message
    pub fn message(&self, channel_id: Snowflake, id: Snowflake) -> Option<Message> {
        self.messages
            .get(&channel_id)
            .and_then(|history| history.iter().find(|m| m.id == id).cloned())
    }

    /// Cached messages of a channel, oldest first
    pub fn messages(&self, channel_id: Snowflake) -> Vec<Message> {
        self.messages
            .get(&channel_id)
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop everything; used before a fresh session repopulates the cache
    pub fn clear(&self) {
        self.guilds.clear();
        self.channels.clear();
        self.users.clear();
        self.messages.clear();
        *self.current_user.write() = None;
    }
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn guild(value: serde_json::Value) -> Guild {
        serde_json::from_value(value).unwrap()
    }

    fn channel(value: serde_json::Value) -> Channel {
        serde_json::from_value(value).unwrap()
    }

    fn message(id: u64, channel_id: u64, content: &str) -> Message {
        serde_json::from_value(json!({
            "id": id.to_string(),
            "channel_id": channel_id.to_string(),
            "content": content,
        }))
        .unwrap()
    }

    #[test]
    fn test_upsert_guild_registers_channels() {
        let cache = EntityCache::default();
        cache.upsert_guild(guild(json!({
            "id": "1",
            "name": "guild",
            "channels": [{"id": "2", "type": 0, "name": "general"}]
        })));

        let channel = cache.channel(Snowflake::new(2)).unwrap();
        assert_eq!(channel.guild_id, Some(Snowflake::new(1)));
        assert_eq!(cache.guild_count(), 1);
    }

    #[test]
    fn test_upsert_guild_merges() {
        let cache = EntityCache::default();
        cache.upsert_guild(guild(json!({"id": "1", "unavailable": true})));
        let merged = cache.upsert_guild(guild(json!({"id": "1", "name": "guild"})));

        assert_eq!(merged.name.as_deref(), Some("guild"));
        assert!(!merged.unavailable);
        assert_eq!(cache.guild_count(), 1);
    }

    #[test]
    fn test_remove_guild_unavailable_keeps_entry() {
        let cache = EntityCache::default();
        cache.upsert_guild(guild(json!({"id": "1", "name": "guild"})));

        let marked = cache.remove_guild(Snowflake::new(1), true).unwrap();
        assert!(marked.unavailable);
        assert!(cache.guild(Snowflake::new(1)).is_some());
    }

    #[test]
    fn test_remove_guild_drops_channels() {
        let cache = EntityCache::default();
        cache.upsert_guild(guild(json!({
            "id": "1",
            "channels": [{"id": "2", "type": 0}]
        })));
        cache.insert_message(message(3, 2, "hi"));

        assert!(cache.remove_guild(Snowflake::new(1), false).is_some());
        assert!(cache.guild(Snowflake::new(1)).is_none());
        assert!(cache.channel(Snowflake::new(2)).is_none());
        assert!(cache.messages(Snowflake::new(2)).is_empty());
    }

    #[test]
    fn test_upsert_channel_canonicalises_recipients() {
        let cache = EntityCache::default();
        cache.upsert_user(
            serde_json::from_value(json!({"id": "5", "username": "bob", "avatar": "x"})).unwrap(),
        );

        let stored = cache.upsert_channel(channel(json!({
            "id": "9",
            "type": 1,
            "recipients": [{"id": "5"}]
        })));

        assert_eq!(stored.recipients[0].username.as_deref(), Some("bob"));
        assert_eq!(stored.recipients[0].avatar.as_deref(), Some("x"));
    }

    #[test]
    fn test_channel_update_reaches_guild() {
        let cache = EntityCache::default();
        cache.upsert_guild(guild(json!({
            "id": "1",
            "channels": [{"id": "2", "type": 0, "name": "old"}]
        })));

        cache.upsert_channel(channel(json!({"id": "2", "type": 0, "guild_id": "1", "name": "new"})));

        let guild = cache.guild(Snowflake::new(1)).unwrap();
        assert_eq!(guild.channels[0].name.as_deref(), Some("new"));

        cache.remove_channel(Snowflake::new(2));
        assert!(cache.guild(Snowflake::new(1)).unwrap().channels.is_empty());
    }

    #[test]
    fn test_insert_message_skips_channel_zero() {
        let cache = EntityCache::default();
        assert!(cache.insert_message(message(1, 0, "lost")).is_none());
    }

    #[test]
    fn test_insert_message_is_bounded() {
        let cache = EntityCache::new(2);
        for id in 1..=3 {
            cache.insert_message(message(id, 7, "msg"));
        }

        let ids: Vec<u64> = cache
            .messages(Snowflake::new(7))
            .iter()
            .map(|m| m.id.get())
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_update_message_merges_or_inserts() {
        let cache = EntityCache::default();
        cache.insert_message(message(1, 7, "first"));

        let edited = cache.update_message(message(1, 7, "edited")).unwrap();
        assert_eq!(edited.content.as_deref(), Some("edited"));
        assert_eq!(cache.messages(Snowflake::new(7)).len(), 1);

        cache.update_message(message(2, 7, "unseen"));
        assert_eq!(cache.messages(Snowflake::new(7)).len(), 2);
    }

    #[test]
    fn test_remove_message() {
        let cache = EntityCache::default();
        cache.insert_message(message(1, 7, "bye"));

        let removed = cache.remove_message(Snowflake::new(7), Snowflake::new(1)).unwrap();
        assert_eq!(removed.content.as_deref(), Some("bye"));
        assert!(cache.remove_message(Snowflake::new(7), Snowflake::new(1)).is_none());
    }

    #[test]
    fn test_current_user_merges() {
        let cache = EntityCache::default();
        cache.set_current_user(
            serde_json::from_value(json!({"id": "1", "username": "me", "avatar": "a"})).unwrap(),
        );
        let merged =
            cache.set_current_user(serde_json::from_value(json!({"id": "1", "username": "me2"})).unwrap());

        assert_eq!(merged.username.as_deref(), Some("me2"));
        assert_eq!(merged.avatar.as_deref(), Some("a"));
        assert_eq!(cache.user(Snowflake::new(1)).unwrap().username.as_deref(), Some("me2"));

        cache.clear();
        assert!(cache.current_user().is_none());
    }
}
