//! AutoMod settings repository.
//!
//! Writes are partial updates so concurrent admin commands on different
//! fields never overwrite each other. No read cache here: the moderation
//! core keeps its own in-memory copy and only loads at startup.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use mongodb::Collection;
use mongodb::bson::{Document, doc};
use mongodb::options::UpdateOptions;
use tracing::{debug, warn};

use crate::automod::models::{GuildId, GuildModerationConfig};
use crate::automod::{ConfigStorage, ConfigUpdate};
use crate::database::Database;
use crate::database::models::{AutomodDocument, to_bson_id};

const COLLECTION: &str = "automod_config";

pub struct AutomodRepository {
    collection: Collection<AutomodDocument>,
}

impl AutomodRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(COLLECTION),
        }
    }
}

/// MongoDB update document for one config change.
pub fn update_document(update: &ConfigUpdate) -> Document {
    match update {
        ConfigUpdate::Enabled(enabled) => doc! { "$set": { "enabled": *enabled } },
        ConfigUpdate::LogChannel(channel) => {
            doc! { "$set": { "log_channel_id": channel.map(to_bson_id) } }
        }
        ConfigUpdate::AddWhitelistRole(role) => {
            doc! { "$addToSet": { "whitelisted_roles": to_bson_id(*role) } }
        }
        ConfigUpdate::RemoveWhitelistRole(role) => {
            doc! { "$pull": { "whitelisted_roles": to_bson_id(*role) } }
        }
        ConfigUpdate::AddWhitelistChannel(channel) => {
            doc! { "$addToSet": { "whitelisted_channels": to_bson_id(*channel) } }
        }
        ConfigUpdate::RemoveWhitelistChannel(channel) => {
            doc! { "$pull": { "whitelisted_channels": to_bson_id(*channel) } }
        }
        ConfigUpdate::AddBannedWord(word) => {
            doc! { "$addToSet": { "banned_words": word.as_str() } }
        }
        ConfigUpdate::RemoveBannedWord(word) => doc! { "$pull": { "banned_words": word.as_str() } },
        ConfigUpdate::AddBannedLink(link) => doc! { "$addToSet": { "banned_links": link.as_str() } },
        ConfigUpdate::RemoveBannedLink(link) => doc! { "$pull": { "banned_links": link.as_str() } },
        ConfigUpdate::CapsThreshold(value) => doc! { "$set": { "caps_threshold": *value } },
        ConfigUpdate::EmojiThreshold(value) => doc! { "$set": { "emoji_threshold": *value } },
        ConfigUpdate::SpamLimit(limit) => doc! {
            "$set": {
                "spam_messages": i64::from(limit.count),
                "spam_interval": i64::from(limit.interval_secs),
            }
        },
        ConfigUpdate::FloodLimit(limit) => doc! {
            "$set": {
                "flood_messages": i64::from(limit.count),
                "flood_interval": i64::from(limit.interval_secs),
            }
        },
    }
}

#[async_trait]
impl ConfigStorage for AutomodRepository {
    async fn persist(&self, guild_id: GuildId, update: &ConfigUpdate) -> Result<()> {
        let filter = doc! { "guild_id": to_bson_id(guild_id) };
        let options = UpdateOptions::builder().upsert(true).build();

        self.collection
            .update_one(filter, update_document(update))
            .with_options(options)
            .await
            .with_context(|| format!("failed to persist automod config for guild {guild_id}"))?;

        debug!("Persisted {:?} for guild {}", update, guild_id);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<(GuildId, GuildModerationConfig)>> {
        let mut cursor = self
            .collection
            .find(doc! {})
            .await
            .context("failed to query automod configs")?;
        let mut configs = Vec::new();

        while let Some(result) = cursor.next().await {
            let stored = result.context("failed to decode automod config")?;
            let row: (GuildId, GuildModerationConfig) = stored.try_into().inspect_err(|e| {
                warn!("Rejecting stored automod config: {}", e);
            })?;
            configs.push(row);
        }

        Ok(configs)
    }
}
