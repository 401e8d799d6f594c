//! Automatic moderation.
//!
//! Inbound guild messages flow through exemption checks, the classifier and,
//! on a violation, the enforcer:
//!
//! ```text
//! message ─▶ enabled? ─▶ exempt? ─▶ classify ─▶ take_action
//! ```
//!
//! Platform and storage access go through the traits in [`ports`], so the
//! whole pipeline runs against fakes in tests.

pub mod actuator;
pub mod classifier;
pub mod error;
pub mod models;
pub mod ports;
pub mod store;
pub mod tracker;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

pub use actuator::{EnforcementReport, Enforcer, EnforcerSettings};
pub use error::{ConfigError, PlatformError};
pub use models::{GuildModerationConfig, InboundMessage, MessageAuthor, ModerationStatus, ViolationCategory};
pub use ports::{ConfigStorage, ConfigUpdate, DirectNotice, LogEntry, ModerationPlatform};
pub use store::ConfigStore;
pub use tracker::MessageTracker;

use crate::cache::CacheRegistry;

/// The moderation service: one per process, shared by every handler task.
pub struct AutoMod {
    store: Arc<ConfigStore>,
    tracker: MessageTracker,
    enforcer: Enforcer,
    platform: Arc<dyn ModerationPlatform>,
}

impl AutoMod {
    pub fn new(
        store: Arc<ConfigStore>,
        platform: Arc<dyn ModerationPlatform>,
        caches: &CacheRegistry,
        settings: EnforcerSettings,
    ) -> Self {
        Self {
            store,
            tracker: MessageTracker::new(),
            enforcer: Enforcer::new(Arc::clone(&platform), caches, settings),
            platform,
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn tracker(&self) -> &MessageTracker {
        &self.tracker
    }

    /// Process one inbound message. Returns the enforced category, if any.
    ///
    /// Direct messages, disabled guilds and exempt authors return `None`
    /// without touching the tracker.
    pub async fn handle_message(&self, message: &InboundMessage) -> Option<ViolationCategory> {
        let guild_id = message.guild_id?;

        if !self.store.is_enabled(guild_id) {
            return None;
        }

        if self.store.is_exempt(message, guild_id, self.platform.as_ref()).await {
            return None;
        }

        let config = self.store.get(guild_id);
        let category = classifier::classify(message, guild_id, &config, &self.tracker, Instant::now())?;

        let report = self
            .enforcer
            .take_action(message, guild_id, &config, category)
            .await;

        if report.timeout.is_some() {
            self.tracker.clear_timestamps(guild_id, message.author.id);
        }

        debug!("Handled message {} in guild {}: {:?}", message.id, guild_id, report);
        Some(category)
    }

    /// Drop idle tracker windows. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.tracker.sweep(Instant::now())
    }
}
