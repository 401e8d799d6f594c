//! Utility functions.
//!
//! Collection of text helpers shared by the enforcement path and the
//! Discord adapter.

use std::time::Duration;

use crate::i18n::get_text;

/// Longest body shown in a log entry.
pub const LOG_CONTENT_LIMIT: usize = 1024;

/// Cut `text` to at most `limit` characters, marking the cut with `...`.
pub fn truncate_content(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }

    let keep = limit.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Human readable duration in the given locale, using the largest whole unit.
pub fn format_duration(lang: &str, duration: Duration) -> String {
    let secs = duration.as_secs();
    let (key, n) = if secs < 60 {
        ("duration.seconds", secs)
    } else if secs < 3600 {
        ("duration.minutes", secs / 60)
    } else if secs < 86400 {
        ("duration.hours", secs / 3600)
    } else {
        ("duration.days", secs / 86400)
    };

    get_text(lang, key).replace("{n}", &n.to_string())
}
