//! Moderation data model: per-guild settings, violation tags and the
//! platform-neutral view of an inbound message.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::time::Duration;

use regex::Regex;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, RoleMarker, UserMarker};

use super::error::ConfigError;

pub type GuildId = Id<GuildMarker>;
pub type ChannelId = Id<ChannelMarker>;
pub type RoleId = Id<RoleMarker>;
pub type UserId = Id<UserMarker>;
pub type MessageId = Id<MessageMarker>;

pub const DEFAULT_CAPS_THRESHOLD: f64 = 0.7;
pub const DEFAULT_EMOJI_THRESHOLD: f64 = 0.3;
pub const DEFAULT_SPAM_LIMIT: RateLimit = RateLimit::new(5, 3);
pub const DEFAULT_FLOOD_LIMIT: RateLimit = RateLimit::new(5, 5);

/// Which rule a removed message broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationCategory {
    BannedWord,
    BannedLink,
    ExcessiveCaps,
    ExcessiveEmoji,
    Spam,
    Flood,
}

impl ViolationCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BannedWord => "banned_word",
            Self::BannedLink => "banned_link",
            Self::ExcessiveCaps => "excessive_caps",
            Self::ExcessiveEmoji => "excessive_emoji",
            Self::Spam => "spam",
            Self::Flood => "flood",
        }
    }

    /// Translation key of the human-readable description.
    pub fn description_key(self) -> String {
        format!("automod.violation.{}", self.as_str())
    }
}

impl fmt::Display for ViolationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `count` events inside `interval_secs` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub count: u32,
    pub interval_secs: u32,
}

impl RateLimit {
    pub const fn new(count: u32, interval_secs: u32) -> Self {
        Self {
            count,
            interval_secs,
        }
    }

    /// Build a limit from untrusted numbers, rejecting zero or negative values.
    pub fn checked(name: &'static str, count: i64, interval_secs: i64) -> Result<Self, ConfigError> {
        match (u32::try_from(count), u32::try_from(interval_secs)) {
            (Ok(c), Ok(i)) if c >= 1 && i >= 1 => Ok(Self::new(c, i)),
            _ => Err(ConfigError::InvalidLimit {
                name,
                count,
                interval_secs,
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_secs))
    }
}

/// Validate a ratio threshold: must lie in (0, 1].
pub fn checked_threshold(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidThreshold { name, value })
    }
}

/// Lowercase, trimmed form used for banned words and link substrings.
pub fn normalize_entry(raw: &str) -> Result<String, ConfigError> {
    let entry = raw.trim().to_lowercase();
    if entry.is_empty() {
        return Err(ConfigError::EmptyEntry);
    }
    Ok(entry)
}

/// A banned word together with its whole-word matcher.
#[derive(Debug, Clone)]
pub struct BannedWord {
    word: String,
    pattern: Regex,
}

impl BannedWord {
    pub fn new(raw: &str) -> Result<Self, ConfigError> {
        let word = normalize_entry(raw)?;
        let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(&word))).map_err(|source| {
            ConfigError::InvalidPattern {
                word: word.clone(),
                source,
            }
        })?;
        Ok(Self { word, pattern })
    }

    pub fn as_str(&self) -> &str {
        &self.word
    }

    /// `content` must already be lowercased.
    pub fn is_match(&self, content: &str) -> bool {
        self.pattern.is_match(content)
    }
}

/// Moderation settings of one guild.
#[derive(Debug, Clone)]
pub struct GuildModerationConfig {
    pub enabled: bool,
    pub caps_threshold: f64,
    pub emoji_threshold: f64,
    pub spam_limit: RateLimit,
    pub flood_limit: RateLimit,
    pub log_channel_id: Option<ChannelId>,
    pub whitelisted_role_ids: HashSet<RoleId>,
    pub whitelisted_channel_ids: HashSet<ChannelId>,
    /// Keyed by the normalized word.
    pub banned_words: BTreeMap<String, BannedWord>,
    pub banned_link_substrings: BTreeSet<String>,
}

impl Default for GuildModerationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            caps_threshold: DEFAULT_CAPS_THRESHOLD,
            emoji_threshold: DEFAULT_EMOJI_THRESHOLD,
            spam_limit: DEFAULT_SPAM_LIMIT,
            flood_limit: DEFAULT_FLOOD_LIMIT,
            log_channel_id: None,
            whitelisted_role_ids: HashSet::new(),
            whitelisted_channel_ids: HashSet::new(),
            banned_words: BTreeMap::new(),
            banned_link_substrings: BTreeSet::new(),
        }
    }
}

impl GuildModerationConfig {
    /// Insert a banned word. Returns `false` if it was already present.
    pub fn add_banned_word(&mut self, word: BannedWord) -> bool {
        if self.banned_words.contains_key(word.as_str()) {
            return false;
        }
        self.banned_words.insert(word.as_str().to_string(), word);
        true
    }

    /// First banned word found in `content` (already lowercased).
    pub fn find_banned_word(&self, content: &str) -> Option<&str> {
        self.banned_words
            .values()
            .find(|w| w.is_match(content))
            .map(BannedWord::as_str)
    }

    pub fn status(&self) -> ModerationStatus {
        let mut whitelisted_roles: Vec<RoleId> = self.whitelisted_role_ids.iter().copied().collect();
        whitelisted_roles.sort();
        let mut whitelisted_channels: Vec<ChannelId> =
            self.whitelisted_channel_ids.iter().copied().collect();
        whitelisted_channels.sort();

        ModerationStatus {
            enabled: self.enabled,
            log_channel_id: self.log_channel_id,
            whitelisted_roles,
            whitelisted_channels,
            banned_words_count: self.banned_words.len(),
            banned_links_count: self.banned_link_substrings.len(),
            caps_threshold: self.caps_threshold,
            emoji_threshold: self.emoji_threshold,
            spam_limit: self.spam_limit,
            flood_limit: self.flood_limit,
        }
    }
}

/// Read-only summary of a guild's settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationStatus {
    pub enabled: bool,
    pub log_channel_id: Option<ChannelId>,
    pub whitelisted_roles: Vec<RoleId>,
    pub whitelisted_channels: Vec<ChannelId>,
    pub banned_words_count: usize,
    pub banned_links_count: usize,
    pub caps_threshold: f64,
    pub emoji_threshold: f64,
    pub spam_limit: RateLimit,
    pub flood_limit: RateLimit,
}

/// Author of an inbound message as seen by the moderation core.
#[derive(Debug, Clone)]
pub struct MessageAuthor {
    pub id: UserId,
    pub name: String,
    /// Bot or system account.
    pub is_bot: bool,
    pub role_ids: Vec<RoleId>,
}

/// Platform-neutral inbound message.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub id: MessageId,
    /// `None` for direct messages.
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub author: MessageAuthor,
    pub content: String,
}
