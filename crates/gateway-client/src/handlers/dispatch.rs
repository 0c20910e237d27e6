//! Dispatch handler (op 0)
//!
//! Records the sequence number, decodes the typed payload and applies it to
//! the session and the entity cache. Each event's cache mutations, nested
//! entities included, complete before the next unit starts.

use super::{HandlerContext, HandlerError, HandlerResult};
use crate::client::ClientEvent;
use crate::connection::ConnectionLink;
use crate::events::DispatchEvent;
use crate::model::Message;
use crate::protocol::Envelope;
use std::sync::Arc;

/// Handles data-plane events
pub struct DispatchHandler;

impl DispatchHandler {
    pub async fn handle(ctx: &HandlerContext, link: &ConnectionLink, envelope: Envelope) -> HandlerResult {
        let sequence = envelope.sequence();
        if let Some(sequence) = sequence {
            ctx.session.record_sequence(sequence);
        }

        let name = envelope.event_name().unwrap_or_default().to_string();
        let Some(decoded) = DispatchEvent::decode(&name, envelope.into_data()) else {
            tracing::trace!(attempt = link.attempt(), event = %name, "Ignoring unhandled event");
            return Ok(());
        };
        let event = decoded.map_err(|e| HandlerError::invalid_payload(name.as_str(), e))?;

        Self::apply(ctx, link, &event)?;

        tracing::trace!(attempt = link.attempt(), event = %name, sequence = ?sequence, "Dispatch applied");

        ctx.notifier.emit(ClientEvent::Dispatch {
            sequence,
            event: Arc::new(event),
        });

        Ok(())
    }

    fn apply(ctx: &HandlerContext, link: &ConnectionLink, event: &DispatchEvent) -> HandlerResult {
        let cache = &ctx.cache;

        match event {
            DispatchEvent::Ready(ready) => {
                ctx.session.mark_ready(ready.session_id.clone())?;
                Self::ensure_heartbeat(ctx, link);

                cache.clear();
                cache.set_current_user(ready.user.clone());
                for guild in &ready.guilds {
                    cache.upsert_guild(guild.clone());
                }
                for channel in &ready.private_channels {
                    cache.upsert_channel(channel.clone());
                }

                tracing::info!(
                    attempt = link.attempt(),
                    session_id = %ready.session_id,
                    guilds = ready.guilds.len(),
                    "Session ready"
                );
                ctx.notifier.emit(ClientEvent::SessionReady {
                    session_id: ready.session_id.clone(),
                });
            }
            DispatchEvent::Resumed => {
                let session_id = ctx.session.mark_resumed()?.unwrap_or_default();
                Self::ensure_heartbeat(ctx, link);

                tracing::info!(
                    attempt = link.attempt(),
                    session_id = %session_id,
                    sequence = ?ctx.session.last_sequence(),
                    "Session resumed"
                );
                ctx.notifier.emit(ClientEvent::SessionResumed { session_id });
            }
            other => {
                ctx.session.record_dispatch();
                Self::apply_to_cache(ctx, other);
            }
        }

        Ok(())
    }

    fn apply_to_cache(ctx: &HandlerContext, event: &DispatchEvent) {
        let cache = &ctx.cache;

        match event {
            DispatchEvent::GuildCreate(guild) | DispatchEvent::GuildUpdate(guild) => {
                cache.upsert_guild((**guild).clone());
            }
            DispatchEvent::GuildDelete(deleted) => {
                cache.remove_guild(deleted.id, deleted.unavailable);
            }
            DispatchEvent::ChannelCreate(channel) | DispatchEvent::ChannelUpdate(channel) => {
                cache.upsert_channel((**channel).clone());
            }
            DispatchEvent::ChannelDelete(channel) => {
                cache.remove_channel(channel.id);
            }
            DispatchEvent::MessageCreate(message) => {
                cache.insert_message((**message).clone());
            }
            DispatchEvent::MessageUpdate(message) => {
                cache.update_message((**message).clone());
            }
            DispatchEvent::MessageDelete(deleted) => {
                let message = cache
                    .remove_message(deleted.channel_id, deleted.id)
                    .unwrap_or_else(|| Message::stub(deleted.id, deleted.channel_id, deleted.guild_id));
                ctx.notifier.emit(ClientEvent::MessageDeleted { message });
            }
            DispatchEvent::UserUpdate(user) => {
                let is_current = cache.current_user().is_some_and(|current| current.id == user.id);
                if is_current {
                    cache.set_current_user((**user).clone());
                } else {
                    cache.upsert_user((**user).clone());
                }
            }
            DispatchEvent::Ready(_) | DispatchEvent::Resumed => {}
        }
    }

    /// Hello arms the heartbeat; a session going live without one arms it here
    fn ensure_heartbeat(ctx: &HandlerContext, link: &ConnectionLink) {
        if ctx.heartbeat.is_armed_for(link.attempt()) {
            return;
        }

        if let Some(interval) = ctx.session.heartbeat_interval() {
            ctx.heartbeat.arm(ctx.session.clone(), link, interval);
        }
    }
}
