//! Vigil - Discord auto-moderation bot
//!
//! Removes messages that break a guild's rules (banned words and links,
//! excessive caps or emoji, spam, flood), notifies the author and writes
//! an entry to the guild's log channel.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `automod` - Moderation core: classifier, tracker, config store, enforcer
//! - `database` - MongoDB persistence of guild settings
//! - `cache` - Named typed caches with Moka
//! - `permissions` - Administrator checks with caching
//! - `bot` - Gateway shards, event routing and the Discord adapter
//! - `events` - Event handlers
//! - `i18n` - Translation tables
//! - `utils` - Utility functions

pub mod automod;
pub mod bot;
pub mod cache;
pub mod config;
pub mod database;
pub mod events;
pub mod i18n;
pub mod permissions;
pub mod utils;
