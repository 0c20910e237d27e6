//! Test fixtures and data generators
//!
//! Dispatch payloads shaped like the ones a real gateway sends.

use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique snowflakes
static COUNTER: AtomicU64 = AtomicU64::new(1_000);

/// Get a unique id for test data
pub fn unique_id() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// GUILD_CREATE with one text channel
pub fn guild_create(guild_id: u64, channel_id: u64) -> Value {
    json!({
        "id": guild_id.to_string(),
        "name": format!("Test Guild {guild_id}"),
        "owner_id": "1",
        "member_count": 3,
        "channels": [{
            "id": channel_id.to_string(),
            "type": 0,
            "name": "general",
            "position": 0
        }]
    })
}

/// MESSAGE_CREATE in a guild channel
pub fn message_create(message_id: u64, channel_id: u64, content: &str) -> Value {
    json!({
        "id": message_id.to_string(),
        "channel_id": channel_id.to_string(),
        "author": {"id": "2", "username": "someone", "discriminator": "0001"},
        "content": content,
        "timestamp": "2024-01-01T00:00:00+00:00"
    })
}

/// MESSAGE_DELETE
pub fn message_delete(message_id: u64, channel_id: u64) -> Value {
    json!({
        "id": message_id.to_string(),
        "channel_id": channel_id.to_string()
    })
}

/// READY frame with a user and one unavailable guild
pub fn ready_frame(session_id: &str, sequence: u64) -> Value {
    json!({
        "op": 0,
        "t": "READY",
        "s": sequence,
        "d": {
            "v": 9,
            "session_id": session_id,
            "user": {"id": "1", "username": "e2e-user", "bot": true},
            "guilds": [{"id": "10", "unavailable": true}]
        }
    })
}

pub fn hello_frame(interval_ms: u64) -> Value {
    json!({"op": 10, "d": {"heartbeat_interval": interval_ms}})
}
