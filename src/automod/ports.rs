//! Collaborator interfaces the moderation core is wired against.
//!
//! The Discord adapter (`bot::platform`) and the MongoDB repository
//! (`database::AutomodRepository`) implement these in production; tests
//! use the fakes in `automod::testing`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::PlatformError;
use super::models::{
    BannedWord, ChannelId, GuildId, GuildModerationConfig, MessageId, RateLimit, RoleId, UserId,
    ViolationCategory,
};

/// Chat platform operations used by exemption checks and enforcement.
#[async_trait]
pub trait ModerationPlatform: Send + Sync {
    /// Whether the member holds the administrator capability in the guild.
    async fn is_administrator(&self, guild_id: GuildId, user_id: UserId)
    -> Result<bool, PlatformError>;

    async fn delete_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), PlatformError>;

    /// Privately notify a user. `DeliveryFailure` when they do not accept DMs.
    async fn send_direct_notice(
        &self,
        user_id: UserId,
        notice: &DirectNotice,
    ) -> Result<(), PlatformError>;

    async fn post_log_entry(&self, channel_id: ChannelId, entry: &LogEntry)
    -> Result<(), PlatformError>;

    /// Plain-text operational notice in the log channel.
    async fn post_log_notice(&self, channel_id: ChannelId, text: &str) -> Result<(), PlatformError>;

    async fn timeout_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        until: DateTime<Utc>,
    ) -> Result<(), PlatformError>;
}

/// Durable storage of guild settings.
#[async_trait]
pub trait ConfigStorage: Send + Sync {
    /// Apply one partial update, inserting the guild row if missing.
    async fn persist(&self, guild_id: GuildId, update: &ConfigUpdate) -> anyhow::Result<()>;

    /// Every stored guild, already validated.
    async fn load_all(&self) -> anyhow::Result<Vec<(GuildId, GuildModerationConfig)>>;
}

/// One admin write, as sent to storage and then applied to the cache.
#[derive(Debug, Clone)]
pub enum ConfigUpdate {
    Enabled(bool),
    LogChannel(Option<ChannelId>),
    AddWhitelistRole(RoleId),
    RemoveWhitelistRole(RoleId),
    AddWhitelistChannel(ChannelId),
    RemoveWhitelistChannel(ChannelId),
    AddBannedWord(BannedWord),
    RemoveBannedWord(String),
    AddBannedLink(String),
    RemoveBannedLink(String),
    CapsThreshold(f64),
    EmojiThreshold(f64),
    SpamLimit(RateLimit),
    FloodLimit(RateLimit),
}

impl ConfigUpdate {
    /// Apply to an in-memory config. Returns whether anything changed.
    ///
    /// Values are validated when the update is built, so this cannot fail.
    pub fn apply(&self, config: &mut GuildModerationConfig) -> bool {
        match self {
            Self::Enabled(enabled) => replace(&mut config.enabled, *enabled),
            Self::LogChannel(channel) => replace(&mut config.log_channel_id, *channel),
            Self::AddWhitelistRole(role) => config.whitelisted_role_ids.insert(*role),
            Self::RemoveWhitelistRole(role) => config.whitelisted_role_ids.remove(role),
            Self::AddWhitelistChannel(channel) => config.whitelisted_channel_ids.insert(*channel),
            Self::RemoveWhitelistChannel(channel) => config.whitelisted_channel_ids.remove(channel),
            Self::AddBannedWord(word) => config.add_banned_word(word.clone()),
            Self::RemoveBannedWord(word) => config.banned_words.remove(word).is_some(),
            Self::AddBannedLink(link) => config.banned_link_substrings.insert(link.clone()),
            Self::RemoveBannedLink(link) => config.banned_link_substrings.remove(link),
            Self::CapsThreshold(value) => replace(&mut config.caps_threshold, *value),
            Self::EmojiThreshold(value) => replace(&mut config.emoji_threshold, *value),
            Self::SpamLimit(limit) => replace(&mut config.spam_limit, *limit),
            Self::FloodLimit(limit) => replace(&mut config.flood_limit, *limit),
        }
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

/// A member timeout applied alongside a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedTimeout {
    pub duration: Duration,
    /// Doubled because the author was already timed out recently.
    pub extended: bool,
}

/// Private warning sent to the author of a removed message.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectNotice {
    pub locale: String,
    pub category: ViolationCategory,
    /// Localized description of the broken rule.
    pub reason: String,
    pub timeout: Option<AppliedTimeout>,
}

/// Structured record of one enforcement, written to the guild log channel.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub locale: String,
    pub author_id: UserId,
    pub author_name: String,
    pub channel_id: ChannelId,
    pub category: ViolationCategory,
    pub reason: String,
    /// Original body, truncated for display.
    pub content: String,
    pub timeout: Option<AppliedTimeout>,
    pub timestamp: DateTime<Utc>,
}
