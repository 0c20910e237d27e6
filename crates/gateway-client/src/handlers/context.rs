//! Shared state handed to every handler

use crate::cache::EntityCache;
use crate::client::Notifier;
use crate::connection::{HeartbeatController, Session};
use crate::protocol::IdentifyProperties;
use gateway_common::{ClientConfig, SecretToken};
use std::sync::Arc;
use std::time::Duration;

/// Credentials and properties sent in Identify / Resume
#[derive(Debug, Clone)]
pub struct Identity {
    pub token: SecretToken,
    pub properties: IdentifyProperties,
    pub intents: Option<u64>,
}

/// Collaborators the handlers act on
pub struct HandlerContext {
    pub session: Arc<Session>,
    pub heartbeat: Arc<HeartbeatController>,
    pub cache: Arc<EntityCache>,
    pub notifier: Arc<Notifier>,
    pub identity: Identity,
    /// Bounds of the random wait after an invalid session
    pub invalid_session_delay: (Duration, Duration),
}

impl HandlerContext {
    pub fn new(
        config: &ClientConfig,
        session: Arc<Session>,
        heartbeat: Arc<HeartbeatController>,
        cache: Arc<EntityCache>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            session,
            heartbeat,
            cache,
            notifier,
            identity: Identity {
                token: config.auth.token.clone(),
                properties: IdentifyProperties::current(&config.app.name),
                intents: config.gateway.intents,
            },
            invalid_session_delay: (
                Duration::from_millis(config.reconnect.invalid_session_min_ms),
                Duration::from_millis(config.reconnect.invalid_session_max_ms),
            ),
        }
    }
}
