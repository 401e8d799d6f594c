//! Error taxonomy for the moderation core.

use thiserror::Error;

/// Failure reported by the chat platform adapter.
///
/// Callers decide per variant: `NotFound` counts as already satisfied,
/// `PermissionDenied` and `DeliveryFailure` are logged and the step is abandoned.
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    /// The platform refused the action (missing permission, hierarchy).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The target message, channel or member no longer exists.
    #[error("target not found")]
    NotFound,

    /// A direct notice could not be delivered (recipient blocks DMs).
    #[error("delivery failed: {0}")]
    DeliveryFailure(String),

    /// Any other transport or API failure.
    #[error("request failed: {0}")]
    Request(String),
}

/// Failure of a configuration read or write.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be in (0, 1], got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("{name} needs count >= 1 and interval >= 1s, got {count} in {interval_secs}s")]
    InvalidLimit {
        name: &'static str,
        count: i64,
        interval_secs: i64,
    },

    #[error("entry must not be empty")]
    EmptyEntry,

    #[error("banned word {word:?} cannot be compiled: {source}")]
    InvalidPattern {
        word: String,
        #[source]
        source: regex::Error,
    },

    /// A persisted row that cannot be mapped onto a valid config.
    #[error("stored config for guild {guild_id} is invalid: {reason}")]
    InvalidRow { guild_id: i64, reason: String },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

