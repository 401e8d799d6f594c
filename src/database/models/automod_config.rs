//! AutoMod configuration document, one per guild.

use std::collections::HashSet;

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use twilight_model::id::Id;

use crate::automod::ConfigError;
use crate::automod::models::{
    BannedWord, DEFAULT_CAPS_THRESHOLD, DEFAULT_EMOJI_THRESHOLD, DEFAULT_FLOOD_LIMIT,
    DEFAULT_SPAM_LIMIT, GuildId, GuildModerationConfig, RateLimit, checked_threshold,
    normalize_entry,
};

/// Stored form of [`GuildModerationConfig`].
///
/// Discord snowflakes are stored as `i64`; they fit in 63 bits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomodDocument {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Discord guild ID (indexed)
    pub guild_id: i64,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_caps_threshold")]
    pub caps_threshold: f64,

    #[serde(default = "default_emoji_threshold")]
    pub emoji_threshold: f64,

    #[serde(default = "default_spam_messages")]
    pub spam_messages: i64,

    #[serde(default = "default_spam_interval")]
    pub spam_interval: i64,

    #[serde(default = "default_flood_messages")]
    pub flood_messages: i64,

    #[serde(default = "default_flood_interval")]
    pub flood_interval: i64,

    #[serde(default)]
    pub log_channel_id: Option<i64>,

    #[serde(default)]
    pub whitelisted_roles: Vec<i64>,

    #[serde(default)]
    pub whitelisted_channels: Vec<i64>,

    #[serde(default)]
    pub banned_words: Vec<String>,

    #[serde(default)]
    pub banned_links: Vec<String>,
}

fn default_caps_threshold() -> f64 {
    DEFAULT_CAPS_THRESHOLD
}

fn default_emoji_threshold() -> f64 {
    DEFAULT_EMOJI_THRESHOLD
}

fn default_spam_messages() -> i64 {
    DEFAULT_SPAM_LIMIT.count.into()
}

fn default_spam_interval() -> i64 {
    DEFAULT_SPAM_LIMIT.interval_secs.into()
}

fn default_flood_messages() -> i64 {
    DEFAULT_FLOOD_LIMIT.count.into()
}

fn default_flood_interval() -> i64 {
    DEFAULT_FLOOD_LIMIT.interval_secs.into()
}

impl AutomodDocument {
    pub fn new(guild_id: i64) -> Self {
        Self {
            id: None,
            guild_id,
            enabled: false,
            caps_threshold: DEFAULT_CAPS_THRESHOLD,
            emoji_threshold: DEFAULT_EMOJI_THRESHOLD,
            spam_messages: default_spam_messages(),
            spam_interval: default_spam_interval(),
            flood_messages: default_flood_messages(),
            flood_interval: default_flood_interval(),
            log_channel_id: None,
            whitelisted_roles: Vec::new(),
            whitelisted_channels: Vec::new(),
            banned_words: Vec::new(),
            banned_links: Vec::new(),
        }
    }
}

/// Snowflake as stored in BSON.
pub fn to_bson_id<T>(id: Id<T>) -> i64 {
    id.get() as i64
}

fn from_bson_id<T>(raw: i64) -> Option<Id<T>> {
    u64::try_from(raw).ok().and_then(Id::new_checked)
}

/// All ids or the first raw value that is not a snowflake.
fn id_set<T>(raw: &[i64]) -> Result<HashSet<Id<T>>, i64> {
    raw.iter().map(|&id| from_bson_id(id).ok_or(id)).collect()
}

impl TryFrom<AutomodDocument> for (GuildId, GuildModerationConfig) {
    type Error = ConfigError;

    fn try_from(doc: AutomodDocument) -> Result<Self, Self::Error> {
        let raw_guild = doc.guild_id;
        let invalid = |reason: String| ConfigError::InvalidRow {
            guild_id: raw_guild,
            reason,
        };

        let guild_id: GuildId =
            from_bson_id(raw_guild).ok_or_else(|| invalid("guild_id is not a snowflake".into()))?;

        let log_channel_id = doc
            .log_channel_id
            .map(|raw| from_bson_id(raw).ok_or_else(|| invalid(format!("log_channel_id {raw}"))))
            .transpose()?;

        let mut config = GuildModerationConfig {
            enabled: doc.enabled,
            caps_threshold: checked_threshold("caps_threshold", doc.caps_threshold)
                .map_err(|e| invalid(e.to_string()))?,
            emoji_threshold: checked_threshold("emoji_threshold", doc.emoji_threshold)
                .map_err(|e| invalid(e.to_string()))?,
            spam_limit: RateLimit::checked("spam", doc.spam_messages, doc.spam_interval)
                .map_err(|e| invalid(e.to_string()))?,
            flood_limit: RateLimit::checked("flood", doc.flood_messages, doc.flood_interval)
                .map_err(|e| invalid(e.to_string()))?,
            log_channel_id,
            whitelisted_role_ids: id_set(&doc.whitelisted_roles)
                .map_err(|id| invalid(format!("whitelisted_roles contains {id}")))?,
            whitelisted_channel_ids: id_set(&doc.whitelisted_channels)
                .map_err(|id| invalid(format!("whitelisted_channels contains {id}")))?,
            ..Default::default()
        };

        for raw in &doc.banned_words {
            let word = BannedWord::new(raw).map_err(|e| invalid(e.to_string()))?;
            config.add_banned_word(word);
        }

        for raw in &doc.banned_links {
            let link = normalize_entry(raw).map_err(|e| invalid(e.to_string()))?;
            config.banned_link_substrings.insert(link);
        }

        Ok((guild_id, config))
    }
}
