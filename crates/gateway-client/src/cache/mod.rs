//! Entity cache
//!
//! Remote guilds, channels, users and recent messages as seen through dispatch events.

mod entity_cache;

pub use entity_cache::EntityCache;
