//! Per-guild configuration cache backed by durable storage.
//!
//! Every mutator writes to storage first and only then touches the cache,
//! so a failed write leaves the in-memory view exactly as it was. Writers
//! for one guild are serialized, so the cache applies updates in the order
//! storage acknowledged them.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::ConfigError;
use super::models::{
    BannedWord, ChannelId, GuildId, GuildModerationConfig, InboundMessage, ModerationStatus,
    RateLimit, RoleId, checked_threshold, normalize_entry,
};
use super::ports::{ConfigStorage, ConfigUpdate, ModerationPlatform};

static DEFAULT_CONFIG: LazyLock<Arc<GuildModerationConfig>> =
    LazyLock::new(|| Arc::new(GuildModerationConfig::default()));

/// In-memory guild settings, one snapshot per guild.
///
/// Readers receive an `Arc` snapshot and never block writers; writers
/// copy-on-write under the DashMap shard lock.
pub struct ConfigStore {
    storage: Arc<dyn ConfigStorage>,
    configs: DashMap<GuildId, Arc<GuildModerationConfig>>,
    write_locks: DashMap<GuildId, Arc<Mutex<()>>>,
}

impl ConfigStore {
    pub fn new(storage: Arc<dyn ConfigStorage>) -> Self {
        Self {
            storage,
            configs: DashMap::new(),
            write_locks: DashMap::new(),
        }
    }

    /// Replace the whole cache with what storage holds.
    ///
    /// Safe to call again later; the previous contents are discarded only
    /// after every row loaded and validated.
    pub async fn load(&self) -> Result<usize, ConfigError> {
        let rows = self.storage.load_all().await?;

        let fresh: HashMap<GuildId, Arc<GuildModerationConfig>> = rows
            .into_iter()
            .map(|(guild_id, config)| (guild_id, Arc::new(config)))
            .collect();
        let count = fresh.len();

        self.configs.retain(|guild_id, _| fresh.contains_key(guild_id));
        for (guild_id, config) in fresh {
            self.configs.insert(guild_id, config);
        }

        let enabled = self.configs.iter().filter(|c| c.enabled).count();
        info!("Loaded automod config for {} guilds ({} enabled)", count, enabled);
        Ok(count)
    }

    /// Current snapshot for a guild; defaults when nothing was ever stored.
    pub fn get(&self, guild_id: GuildId) -> Arc<GuildModerationConfig> {
        self.configs
            .get(&guild_id)
            .map(|entry| Arc::clone(entry.value()))
            .unwrap_or_else(|| Arc::clone(&DEFAULT_CONFIG))
    }

    pub fn is_enabled(&self, guild_id: GuildId) -> bool {
        self.configs.get(&guild_id).is_some_and(|c| c.enabled)
    }

    /// Whether `message` bypasses moderation entirely.
    ///
    /// Checked in order, short-circuiting: bot/system author, whitelisted
    /// role, whitelisted channel, administrator capability. A failed
    /// administrator lookup counts as "not an administrator".
    pub async fn is_exempt(
        &self,
        message: &InboundMessage,
        guild_id: GuildId,
        platform: &dyn ModerationPlatform,
    ) -> bool {
        if message.author.is_bot {
            return true;
        }

        let config = self.get(guild_id);

        if message
            .author
            .role_ids
            .iter()
            .any(|role| config.whitelisted_role_ids.contains(role))
        {
            debug!("User {} exempt by role in guild {}", message.author.id, guild_id);
            return true;
        }

        if config.whitelisted_channel_ids.contains(&message.channel_id) {
            debug!("Channel {} exempt in guild {}", message.channel_id, guild_id);
            return true;
        }

        match platform.is_administrator(guild_id, message.author.id).await {
            Ok(true) => {
                debug!("Administrator {} exempt in guild {}", message.author.id, guild_id);
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(
                    "Administrator lookup failed for user {} in guild {}: {}",
                    message.author.id, guild_id, e
                );
                false
            }
        }
    }

    pub fn status(&self, guild_id: GuildId) -> ModerationStatus {
        self.get(guild_id).status()
    }

    /// Banned words of a guild, sorted.
    pub fn banned_words(&self, guild_id: GuildId) -> Vec<String> {
        self.get(guild_id).banned_words.keys().cloned().collect()
    }

    /// Banned link substrings of a guild, sorted.
    pub fn banned_links(&self, guild_id: GuildId) -> Vec<String> {
        self.get(guild_id).banned_link_substrings.iter().cloned().collect()
    }

    pub async fn set_enabled(&self, guild_id: GuildId, enabled: bool) -> Result<bool, ConfigError> {
        self.apply(guild_id, ConfigUpdate::Enabled(enabled)).await
    }

    pub async fn set_log_channel(
        &self,
        guild_id: GuildId,
        channel_id: Option<ChannelId>,
    ) -> Result<bool, ConfigError> {
        self.apply(guild_id, ConfigUpdate::LogChannel(channel_id)).await
    }

    pub async fn add_whitelist_role(&self, guild_id: GuildId, role_id: RoleId) -> Result<bool, ConfigError> {
        self.apply(guild_id, ConfigUpdate::AddWhitelistRole(role_id)).await
    }

    pub async fn remove_whitelist_role(
        &self,
        guild_id: GuildId,
        role_id: RoleId,
    ) -> Result<bool, ConfigError> {
        self.apply(guild_id, ConfigUpdate::RemoveWhitelistRole(role_id)).await
    }

    pub async fn add_whitelist_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<bool, ConfigError> {
        self.apply(guild_id, ConfigUpdate::AddWhitelistChannel(channel_id)).await
    }

    pub async fn remove_whitelist_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<bool, ConfigError> {
        self.apply(guild_id, ConfigUpdate::RemoveWhitelistChannel(channel_id)).await
    }

    pub async fn add_banned_word(&self, guild_id: GuildId, word: &str) -> Result<bool, ConfigError> {
        let word = BannedWord::new(word)?;
        self.apply(guild_id, ConfigUpdate::AddBannedWord(word)).await
    }

    pub async fn remove_banned_word(&self, guild_id: GuildId, word: &str) -> Result<bool, ConfigError> {
        let word = normalize_entry(word)?;
        self.apply(guild_id, ConfigUpdate::RemoveBannedWord(word)).await
    }

    pub async fn add_banned_link(&self, guild_id: GuildId, link: &str) -> Result<bool, ConfigError> {
        let link = normalize_entry(link)?;
        self.apply(guild_id, ConfigUpdate::AddBannedLink(link)).await
    }

    pub async fn remove_banned_link(&self, guild_id: GuildId, link: &str) -> Result<bool, ConfigError> {
        let link = normalize_entry(link)?;
        self.apply(guild_id, ConfigUpdate::RemoveBannedLink(link)).await
    }

    pub async fn set_caps_threshold(&self, guild_id: GuildId, threshold: f64) -> Result<bool, ConfigError> {
        let threshold = checked_threshold("caps_threshold", threshold)?;
        self.apply(guild_id, ConfigUpdate::CapsThreshold(threshold)).await
    }

    pub async fn set_emoji_threshold(&self, guild_id: GuildId, threshold: f64) -> Result<bool, ConfigError> {
        let threshold = checked_threshold("emoji_threshold", threshold)?;
        self.apply(guild_id, ConfigUpdate::EmojiThreshold(threshold)).await
    }

    pub async fn set_spam_settings(
        &self,
        guild_id: GuildId,
        messages: u32,
        interval_secs: u32,
    ) -> Result<bool, ConfigError> {
        let limit = RateLimit::checked("spam", messages.into(), interval_secs.into())?;
        self.apply(guild_id, ConfigUpdate::SpamLimit(limit)).await
    }

    pub async fn set_flood_settings(
        &self,
        guild_id: GuildId,
        messages: u32,
        interval_secs: u32,
    ) -> Result<bool, ConfigError> {
        let limit = RateLimit::checked("flood", messages.into(), interval_secs.into())?;
        self.apply(guild_id, ConfigUpdate::FloodLimit(limit)).await
    }

    /// Persist, then update the cached snapshot. Returns whether the cache changed.
    async fn apply(&self, guild_id: GuildId, update: ConfigUpdate) -> Result<bool, ConfigError> {
        let lock = Arc::clone(self.write_locks.entry(guild_id).or_default().value());
        let _guard = lock.lock().await;

        self.storage.persist(guild_id, &update).await?;

        let mut entry = self
            .configs
            .entry(guild_id)
            .or_insert_with(|| Arc::clone(&DEFAULT_CONFIG));
        let changed = update.apply(Arc::make_mut(entry.value_mut()));

        debug!("Applied {:?} to guild {} (changed: {})", update, guild_id, changed);
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use twilight_model::id::Id;

    use super::*;
    use crate::automod::testing::{FakePlatform, FakeStorage, message_from};

    const GUILD: GuildId = Id::new(1);

    fn store() -> (ConfigStore, Arc<FakeStorage>) {
        let storage = Arc::new(FakeStorage::default());
        (ConfigStore::new(storage.clone()), storage)
    }

    #[tokio::test]
    async fn unknown_guild_is_disabled_with_defaults() {
        let (store, _) = store();
        assert!(!store.is_enabled(GUILD));
        assert_eq!(store.get(GUILD).spam_limit, RateLimit::new(5, 3));
    }

    #[tokio::test]
    async fn first_write_creates_the_guild() {
        let (store, storage) = store();

        assert!(store.set_enabled(GUILD, true).await.unwrap());
        assert!(store.is_enabled(GUILD));
        assert_eq!(storage.writes(), 1);
    }

    #[tokio::test]
    async fn adding_same_word_twice_is_idempotent() {
        let (store, _) = store();

        assert!(store.add_banned_word(GUILD, "Scam").await.unwrap());
        assert!(!store.add_banned_word(GUILD, "scam").await.unwrap());
        assert_eq!(store.banned_words(GUILD), vec!["scam".to_string()]);
    }

    #[tokio::test]
    async fn storage_failure_leaves_cache_untouched() {
        let (store, storage) = store();
        store.add_banned_link(GUILD, "bad.com").await.unwrap();

        storage.fail_writes(true);
        assert!(store.add_banned_link(GUILD, "worse.com").await.is_err());
        assert!(store.set_enabled(GUILD, true).await.is_err());

        assert_eq!(store.banned_links(GUILD), vec!["bad.com".to_string()]);
        assert!(!store.is_enabled(GUILD));
    }

    /// Acknowledges `Enabled(true)` slowly, everything else at once.
    #[derive(Default)]
    struct SlowStorage {
        enabled: parking_lot::Mutex<Option<bool>>,
    }

    #[async_trait::async_trait]
    impl ConfigStorage for SlowStorage {
        async fn persist(&self, _guild_id: GuildId, update: &ConfigUpdate) -> anyhow::Result<()> {
            if let ConfigUpdate::Enabled(enabled) = update {
                *self.enabled.lock() = Some(*enabled);
                if *enabled {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
            Ok(())
        }

        async fn load_all(&self) -> anyhow::Result<Vec<(GuildId, GuildModerationConfig)>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn concurrent_writes_land_in_storage_order() {
        let storage = Arc::new(SlowStorage::default());
        let store = Arc::new(ConfigStore::new(storage.clone()));

        let slow = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.set_enabled(GUILD, true).await }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        let fast = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.set_enabled(GUILD, false).await }
        });

        slow.await.unwrap().unwrap();
        fast.await.unwrap().unwrap();

        assert_eq!(*storage.enabled.lock(), Some(false));
        assert!(!store.is_enabled(GUILD));
    }

    #[tokio::test]
    async fn invalid_values_never_reach_storage() {
        let (store, storage) = store();

        assert!(matches!(
            store.set_caps_threshold(GUILD, 0.0).await,
            Err(ConfigError::InvalidThreshold { .. })
        ));
        assert!(matches!(
            store.set_spam_settings(GUILD, 0, 5).await,
            Err(ConfigError::InvalidLimit { .. })
        ));
        assert!(matches!(
            store.add_banned_word(GUILD, "  ").await,
            Err(ConfigError::EmptyEntry)
        ));
        assert_eq!(storage.writes(), 0);
    }

    #[tokio::test]
    async fn load_replaces_previous_contents() {
        let (store, storage) = store();
        store.set_enabled(Id::new(99), true).await.unwrap();

        let stored = GuildModerationConfig {
            enabled: true,
            caps_threshold: 0.5,
            ..Default::default()
        };
        storage.seed(GUILD, stored);

        assert_eq!(store.load().await.unwrap(), 1);
        assert!(store.is_enabled(GUILD));
        assert!(!store.is_enabled(Id::new(99)));
        assert_eq!(store.get(GUILD).caps_threshold, 0.5);

        // Loading twice yields the same view.
        assert_eq!(store.load().await.unwrap(), 1);
        assert_eq!(store.status(GUILD).caps_threshold, 0.5);
    }

    #[tokio::test]
    async fn failed_load_keeps_existing_cache() {
        let (store, storage) = store();
        store.set_enabled(GUILD, true).await.unwrap();

        storage.fail_reads(true);
        assert!(store.load().await.is_err());
        assert!(store.is_enabled(GUILD));
    }

    #[tokio::test]
    async fn status_reflects_mutations() {
        let (store, _) = store();
        store.set_log_channel(GUILD, Some(Id::new(50))).await.unwrap();
        store.set_spam_settings(GUILD, 4, 6).await.unwrap();
        store.set_flood_settings(GUILD, 3, 5).await.unwrap();
        store.set_emoji_threshold(GUILD, 0.4).await.unwrap();
        store.add_whitelist_channel(GUILD, Id::new(60)).await.unwrap();
        store.add_banned_word(GUILD, "spam").await.unwrap();

        let status = store.status(GUILD);
        assert_eq!(status.log_channel_id, Some(Id::new(50)));
        assert_eq!(status.spam_limit, RateLimit::new(4, 6));
        assert_eq!(status.flood_limit, RateLimit::new(3, 5));
        assert_eq!(status.emoji_threshold, 0.4);
        assert_eq!(status.whitelisted_channels, vec![Id::new(60)]);
        assert_eq!(status.banned_words_count, 1);

        assert!(store.remove_whitelist_channel(GUILD, Id::new(60)).await.unwrap());
        assert!(store.remove_banned_word(GUILD, "SPAM").await.unwrap());
        assert!(!store.remove_banned_link(GUILD, "never-added.com").await.unwrap());
        assert_eq!(store.status(GUILD).banned_words_count, 0);
    }

    #[tokio::test]
    async fn bots_are_exempt() {
        let (store, _) = store();
        let platform = FakePlatform::default();
        let mut msg = message_from(GUILD, "hello");
        msg.author.is_bot = true;

        assert!(store.is_exempt(&msg, GUILD, &platform).await);
        assert_eq!(platform.admin_lookups(), 0);
    }

    #[tokio::test]
    async fn whitelisted_role_short_circuits() {
        let (store, _) = store();
        let platform = FakePlatform::default();
        store.add_whitelist_role(GUILD, Id::new(7)).await.unwrap();

        let mut msg = message_from(GUILD, "hello");
        msg.author.role_ids = vec![Id::new(3), Id::new(7)];

        assert!(store.is_exempt(&msg, GUILD, &platform).await);
        assert_eq!(platform.admin_lookups(), 0);

        store.remove_whitelist_role(GUILD, Id::new(7)).await.unwrap();
        assert!(!store.is_exempt(&msg, GUILD, &platform).await);
    }

    #[tokio::test]
    async fn whitelisted_channel_is_exempt() {
        let (store, _) = store();
        let platform = FakePlatform::default();
        let msg = message_from(GUILD, "hello");
        store.add_whitelist_channel(GUILD, msg.channel_id).await.unwrap();

        assert!(store.is_exempt(&msg, GUILD, &platform).await);
    }

    #[tokio::test]
    async fn administrators_are_exempt_and_lookup_errors_are_not() {
        let (store, _) = store();
        let platform = FakePlatform::default();
        let msg = message_from(GUILD, "hello");

        platform.set_admin(true);
        assert!(store.is_exempt(&msg, GUILD, &platform).await);

        platform.set_admin(false);
        platform.fail_admin_lookup(true);
        assert!(!store.is_exempt(&msg, GUILD, &platform).await);
    }
}
