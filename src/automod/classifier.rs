//! Violation classifier.
//!
//! Checks run in a fixed order and the first match wins. The content checks
//! are pure functions of the body and the guild config; only spam and flood
//! touch the tracker, and they run last so a message removed for its content
//! never counts towards the author's rate.

use std::sync::LazyLock;
use std::time::Instant;

use regex::Regex;
use tracing::debug;

use super::models::{GuildId, GuildModerationConfig, InboundMessage, ViolationCategory};
use super::tracker::MessageTracker;

/// Caps and emoji ratios are meaningless on very short messages.
pub const MIN_RATIO_LENGTH: usize = 8;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:[-\w.]|(?:%[\da-fA-F]{2}))+").expect("static url pattern")
});

static DOMAIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:www\.)?(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}")
        .expect("static domain pattern")
});

static CUSTOM_EMOJI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<a?:[a-zA-Z0-9_]+:\d+>").expect("static emoji pattern"));

/// Run the full pipeline for one message.
pub fn classify(
    message: &InboundMessage,
    guild_id: GuildId,
    config: &GuildModerationConfig,
    tracker: &MessageTracker,
    now: Instant,
) -> Option<ViolationCategory> {
    let content = message.content.as_str();
    let user_id = message.author.id;

    if let Some(word) = find_banned_word(content, config) {
        debug!("Banned word '{}' from user {} in guild {}", word, user_id, guild_id);
        return Some(ViolationCategory::BannedWord);
    }

    if let Some((link, banned)) = find_banned_link(content, config) {
        debug!(
            "Banned link '{}' (contains '{}') from user {} in guild {}",
            link, banned, user_id, guild_id
        );
        return Some(ViolationCategory::BannedLink);
    }

    if is_excessive_caps(content, config.caps_threshold) {
        debug!("Excessive caps from user {} in guild {}", user_id, guild_id);
        return Some(ViolationCategory::ExcessiveCaps);
    }

    if is_excessive_emoji(content, config.emoji_threshold) {
        debug!("Excessive emoji from user {} in guild {}", user_id, guild_id);
        return Some(ViolationCategory::ExcessiveEmoji);
    }

    if tracker.record_spam(guild_id, user_id, config.spam_limit, now) {
        return Some(ViolationCategory::Spam);
    }

    if tracker.record_flood(guild_id, user_id, content, config.flood_limit, now) {
        return Some(ViolationCategory::Flood);
    }

    None
}

/// First configured word appearing as a whole word in the lowercased body.
pub fn find_banned_word<'a>(content: &str, config: &'a GuildModerationConfig) -> Option<&'a str> {
    if config.banned_words.is_empty() {
        return None;
    }
    config.find_banned_word(&content.to_lowercase())
}

/// All `http(s)://` URLs and bare domain-like tokens in `content`.
///
/// `content` should already be lowercased when matching against banned substrings.
pub fn extract_links(content: &str) -> Vec<&str> {
    URL_PATTERN
        .find_iter(content)
        .chain(DOMAIN_PATTERN.find_iter(content))
        .map(|m| m.as_str())
        .collect()
}

/// First extracted link containing a banned substring, with that substring.
pub fn find_banned_link<'a>(
    content: &str,
    config: &'a GuildModerationConfig,
) -> Option<(String, &'a str)> {
    if config.banned_link_substrings.is_empty() {
        return None;
    }

    let lowered = content.to_lowercase();
    extract_links(&lowered).into_iter().find_map(|link| {
        config
            .banned_link_substrings
            .iter()
            .find(|banned| link.contains(banned.as_str()))
            .map(|banned| (link.to_string(), banned.as_str()))
    })
}

/// Uppercase letters over all letters, or `None` when the ratio does not apply.
pub fn caps_ratio(content: &str) -> Option<f64> {
    if content.chars().count() < MIN_RATIO_LENGTH {
        return None;
    }

    let (upper, letters) = content
        .chars()
        .filter(|c| c.is_alphabetic())
        .fold((0usize, 0usize), |(upper, letters), c| {
            (upper + usize::from(c.is_uppercase()), letters + 1)
        });

    if letters == 0 {
        return None;
    }
    Some(upper as f64 / letters as f64)
}

pub fn is_excessive_caps(content: &str, threshold: f64) -> bool {
    caps_ratio(content).is_some_and(|ratio| ratio > threshold)
}

/// Custom emoji tokens plus supplementary-plane codepoints over total length.
pub fn emoji_ratio(content: &str) -> Option<f64> {
    let length = content.chars().count();
    if length < MIN_RATIO_LENGTH {
        return None;
    }

    let custom = CUSTOM_EMOJI_PATTERN.find_iter(content).count();
    let unicode = content.chars().filter(|&c| u32::from(c) >= 0x10000).count();
    Some((custom + unicode) as f64 / length as f64)
}

pub fn is_excessive_emoji(content: &str, threshold: f64) -> bool {
    emoji_ratio(content).is_some_and(|ratio| ratio > threshold)
}
