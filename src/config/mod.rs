//! Configuration module for the Vigil bot.
//!
//! Loads configuration from environment variables (and `.env` when present).

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,

    /// Owner user IDs (comma-separated).
    /// These users count as administrators in every guild.
    pub owner_ids: Vec<u64>,

    /// Locale for notices and log entries.
    pub locale: String,

    /// Minimum gap between two notices for the same (guild, user, rule).
    pub warning_cooldown: Duration,

    /// Member timeout applied on spam; `None` disables it.
    pub spam_timeout: Option<Duration>,

    // MongoDB
    pub mongodb_uri: String,
    pub mongodb_database: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Fails when a required variable is missing or a number does not parse.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let owner_ids = parse_owner_ids(&env::var("OWNER_IDS").unwrap_or_default())?;
        let locale = crate::i18n::resolve_locale(env::var("BOT_LOCALE").ok().as_deref());
        let warning_cooldown = Duration::from_secs(secs_var("WARNING_COOLDOWN_SECS", 60)?);
        let spam_timeout = match secs_var("SPAM_TIMEOUT_SECS", 300)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            discord_token: env::var("DISCORD_TOKEN").context("DISCORD_TOKEN must be set")?,
            owner_ids,
            locale,
            warning_cooldown,
            spam_timeout,
            mongodb_uri: env::var("MONGODB_URI").context("MONGODB_URI must be set")?,
            mongodb_database: env::var("MONGODB_DATABASE").unwrap_or_else(|_| "vigil".to_string()),
        })
    }
}

fn secs_var(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a whole number of seconds, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn parse_owner_ids(raw: &str) -> Result<Vec<u64>> {
    let mut ids = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match part.parse::<u64>() {
            Ok(id) if id > 0 => ids.push(id),
            _ => bail!("OWNER_IDS contains an invalid user id: {part:?}"),
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_ids_are_comma_separated() {
        assert_eq!(parse_owner_ids("1, 2,3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_owner_ids("").unwrap(), Vec::<u64>::new());
        assert_eq!(parse_owner_ids("5,").unwrap(), vec![5]);
    }

    #[test]
    fn owner_ids_reject_garbage() {
        assert!(parse_owner_ids("12,abc").is_err());
        assert!(parse_owner_ids("0").is_err());
    }
}
