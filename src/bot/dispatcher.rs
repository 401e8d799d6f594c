//! Shared state and gateway event routing.

use std::sync::Arc;

use twilight_cache_inmemory::InMemoryCache;
use twilight_gateway::Event;
use twilight_http::Client as HttpClient;
use tracing::{info, trace};

use crate::automod::AutoMod;
use crate::events;
use crate::permissions::Permissions;

/// Shared application state, cloned into every handler task.
#[derive(Clone)]
pub struct AppState {
    /// Discord REST client.
    pub http: Arc<HttpClient>,

    /// Gateway cache (guilds, roles, members).
    pub gateway_cache: Arc<InMemoryCache>,

    /// Administrator checker with caching.
    pub permissions: Permissions,

    /// The moderation service.
    pub automod: Arc<AutoMod>,
}

/// Route one gateway event. The cache has already been updated.
///
/// Message handling is spawned so a slow REST call never stalls the shard.
pub fn dispatch(state: &AppState, event: Event) {
    match event {
        Event::Ready(ready) => {
            info!(
                "Connected as {} (ID={}) in {} guilds",
                ready.user.name,
                ready.user.id,
                ready.guilds.len()
            );
        }
        Event::MessageCreate(msg) => {
            let state = state.clone();
            tokio::spawn(async move {
                events::on_message(&state, &msg.0).await;
            });
        }
        Event::MemberUpdate(update) => {
            events::on_member_changed(state, update.guild_id, update.user.id);
        }
        Event::MemberRemove(removed) => {
            events::on_member_changed(state, removed.guild_id, removed.user.id);
        }
        other => {
            trace!("Unhandled event: {:?}", other.kind());
        }
    }
}
