//! Enforcement of a classified violation.
//!
//! Every step is best effort: a failure is logged and the remaining steps
//! still run. The steps are delete, timeout (spam only), private notice
//! (rate limited per guild, user and category) and the log entry.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::error::PlatformError;
use super::models::{GuildId, GuildModerationConfig, InboundMessage, UserId, ViolationCategory};
use super::ports::{AppliedTimeout, DirectNotice, LogEntry, ModerationPlatform};
use crate::cache::{CacheConfig, CacheRegistry, TypedCache};
use crate::i18n::get_text;
use crate::utils::{LOG_CONTENT_LIMIT, truncate_content};

/// Cooldown marker key: one notice per window for each triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CooldownKey {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub category: ViolationCategory,
}

#[derive(Debug, Clone)]
pub struct EnforcerSettings {
    pub locale: String,
    /// Zero disables the cooldown.
    pub notice_cooldown: Duration,
    /// `None` disables spam timeouts.
    pub spam_timeout: Option<Duration>,
}

impl Default for EnforcerSettings {
    fn default() -> Self {
        Self {
            locale: crate::i18n::DEFAULT_LOCALE.to_string(),
            notice_cooldown: Duration::from_secs(60),
            spam_timeout: Some(Duration::from_secs(300)),
        }
    }
}

/// What actually happened for one violation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnforcementReport {
    pub deleted: bool,
    pub timeout: Option<AppliedTimeout>,
    pub notified: bool,
    pub logged: bool,
}

pub struct Enforcer {
    platform: Arc<dyn ModerationPlatform>,
    settings: EnforcerSettings,
    cooldowns: Option<TypedCache<CooldownKey, ()>>,
    recent_timeouts: Option<TypedCache<(GuildId, UserId), ()>>,
}

impl Enforcer {
    pub fn new(
        platform: Arc<dyn ModerationPlatform>,
        caches: &CacheRegistry,
        settings: EnforcerSettings,
    ) -> Self {
        let cooldowns = (!settings.notice_cooldown.is_zero()).then(|| {
            caches.get_or_create(
                "automod_notice_cooldowns",
                CacheConfig::expiring(settings.notice_cooldown),
            )
        });
        let recent_timeouts = settings.spam_timeout.map(|timeout| {
            caches.get_or_create("automod_recent_timeouts", CacheConfig::expiring(timeout))
        });

        Self {
            platform,
            settings,
            cooldowns,
            recent_timeouts,
        }
    }

    pub async fn take_action(
        &self,
        message: &InboundMessage,
        guild_id: GuildId,
        config: &GuildModerationConfig,
        category: ViolationCategory,
    ) -> EnforcementReport {
        let locale = self.settings.locale.as_str();
        let reason = get_text(locale, &category.description_key());
        let mut report = EnforcementReport {
            deleted: self.delete(message, guild_id).await,
            ..Default::default()
        };

        if category == ViolationCategory::Spam {
            report.timeout = self.timeout_author(message, guild_id, config).await;
        }

        if self.notice_allowed(guild_id, message.author.id, category) {
            let notice = DirectNotice {
                locale: locale.to_string(),
                category,
                reason: reason.clone(),
                timeout: report.timeout,
            };
            report.notified = match self
                .platform
                .send_direct_notice(message.author.id, &notice)
                .await
            {
                Ok(()) => true,
                Err(PlatformError::DeliveryFailure(e)) => {
                    info!("User {} does not accept direct notices: {}", message.author.id, e);
                    false
                }
                Err(e) => {
                    warn!("Failed to notify user {}: {}", message.author.id, e);
                    false
                }
            };
        } else {
            debug!(
                "Notice for {} suppressed by cooldown (user {}, guild {})",
                category, message.author.id, guild_id
            );
        }

        if let Some(log_channel_id) = config.log_channel_id {
            let entry = LogEntry {
                locale: locale.to_string(),
                author_id: message.author.id,
                author_name: message.author.name.clone(),
                channel_id: message.channel_id,
                category,
                reason,
                content: truncate_content(&message.content, LOG_CONTENT_LIMIT),
                timeout: report.timeout,
                timestamp: Utc::now(),
            };
            report.logged = match self.platform.post_log_entry(log_channel_id, &entry).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        "Failed to write log entry to channel {} in guild {}: {}",
                        log_channel_id, guild_id, e
                    );
                    false
                }
            };
        }

        info!(
            "AutoMod {} by user {} in guild {}: deleted={} timeout={:?} notified={} logged={}",
            category,
            message.author.id,
            guild_id,
            report.deleted,
            report.timeout.map(|t| t.duration),
            report.notified,
            report.logged
        );

        report
    }

    async fn delete(&self, message: &InboundMessage, guild_id: GuildId) -> bool {
        match self.platform.delete_message(message.channel_id, message.id).await {
            Ok(()) => true,
            Err(PlatformError::NotFound) => {
                debug!("Message {} was already gone", message.id);
                false
            }
            Err(PlatformError::PermissionDenied(e)) => {
                warn!(
                    "Missing permission to delete message {} in guild {}: {}",
                    message.id, guild_id, e
                );
                false
            }
            Err(e) => {
                error!("Failed to delete message {} in guild {}: {}", message.id, guild_id, e);
                false
            }
        }
    }

    /// Time the author out, doubling the duration for a repeat offense
    /// inside the previous timeout period.
    async fn timeout_author(
        &self,
        message: &InboundMessage,
        guild_id: GuildId,
        config: &GuildModerationConfig,
    ) -> Option<AppliedTimeout> {
        let base = self.settings.spam_timeout?;
        let recent = self.recent_timeouts.as_ref()?;
        let key = (guild_id, message.author.id);

        // Claimed before the request so concurrent verdicts from one burst
        // escalate instead of each applying the base duration.
        let extended = !recent.insert_if_absent(key, ());
        let duration = if extended { base.saturating_mul(2) } else { base };
        let Ok(offset) = chrono::Duration::from_std(duration) else {
            if !extended {
                recent.invalidate(&key);
            }
            return None;
        };

        let result = self
            .platform
            .timeout_member(guild_id, message.author.id, Utc::now() + offset)
            .await;
        if result.is_err() && !extended {
            recent.invalidate(&key);
        }

        match result {
            Ok(()) => {
                if extended {
                    recent.insert(key, ());
                }
                Some(AppliedTimeout { duration, extended })
            }
            Err(PlatformError::PermissionDenied(e)) => {
                warn!(
                    "Missing permission to time out user {} in guild {}: {}",
                    message.author.id, guild_id, e
                );
                if let Some(log_channel_id) = config.log_channel_id {
                    let text = get_text(&self.settings.locale, "automod.log.missing_moderate_permission")
                        .replace("{user}", &message.author.id.to_string());
                    if let Err(e) = self.platform.post_log_notice(log_channel_id, &text).await {
                        warn!("Failed to post permission notice in guild {}: {}", guild_id, e);
                    }
                }
                None
            }
            Err(PlatformError::NotFound) => {
                debug!("User {} left guild {} before the timeout", message.author.id, guild_id);
                None
            }
            Err(e) => {
                error!(
                    "Failed to time out user {} in guild {}: {}",
                    message.author.id, guild_id, e
                );
                None
            }
        }
    }

    /// Claims the cooldown slot; `true` for the first violation in the window.
    fn notice_allowed(&self, guild_id: GuildId, user_id: UserId, category: ViolationCategory) -> bool {
        let Some(cooldowns) = &self.cooldowns else {
            return true;
        };
        cooldowns.insert_if_absent(
            CooldownKey {
                guild_id,
                user_id,
                category,
            },
            (),
        )
    }
}

#[cfg(test)]
mod tests {
    use twilight_model::id::Id;

    use super::*;
    use crate::automod::testing::{FakePlatform, message_from};

    const GUILD: GuildId = Id::new(1);

    fn enforcer(platform: &Arc<FakePlatform>, settings: EnforcerSettings) -> Enforcer {
        Enforcer::new(platform.clone(), &CacheRegistry::new(), settings)
    }

    fn logged_config() -> GuildModerationConfig {
        GuildModerationConfig {
            enabled: true,
            log_channel_id: Some(Id::new(50)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn full_enforcement_on_first_violation() {
        let platform = Arc::new(FakePlatform::default());
        let enforcer = enforcer(&platform, EnforcerSettings::default());
        let msg = message_from(GUILD, "buy cheap stuff");

        let report = enforcer
            .take_action(&msg, GUILD, &logged_config(), ViolationCategory::BannedWord)
            .await;

        assert!(report.deleted && report.notified && report.logged);
        assert_eq!(report.timeout, None);
        assert_eq!(platform.deletions(), vec![(msg.channel_id, msg.id)]);

        let notices = platform.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].reason, "Using a banned word");

        let entries = platform.log_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, Id::new(50));
        assert_eq!(entries[0].1.content, "buy cheap stuff");
        assert_eq!(entries[0].1.author_name, "alice");
    }

    #[tokio::test]
    async fn notice_cooldown_is_per_category() {
        let platform = Arc::new(FakePlatform::default());
        let enforcer = enforcer(&platform, EnforcerSettings::default());
        let msg = message_from(GUILD, "whatever");
        let config = logged_config();

        enforcer.take_action(&msg, GUILD, &config, ViolationCategory::BannedLink).await;
        let second = enforcer.take_action(&msg, GUILD, &config, ViolationCategory::BannedLink).await;
        let other = enforcer.take_action(&msg, GUILD, &config, ViolationCategory::Flood).await;

        assert!(!second.notified);
        assert!(second.deleted && second.logged);
        assert!(other.notified);
        assert_eq!(platform.notices().len(), 2);
        assert_eq!(platform.log_entries().len(), 3);
    }

    #[tokio::test]
    async fn delete_failure_does_not_stop_other_steps() {
        let platform = Arc::new(FakePlatform::default());
        platform.fail_delete(PlatformError::PermissionDenied("missing MANAGE_MESSAGES".into()));
        let enforcer = enforcer(&platform, EnforcerSettings::default());

        let report = enforcer
            .take_action(&message_from(GUILD, "x"), GUILD, &logged_config(), ViolationCategory::ExcessiveCaps)
            .await;

        assert!(!report.deleted);
        assert!(report.notified && report.logged);
    }

    #[tokio::test]
    async fn closed_dms_still_log() {
        let platform = Arc::new(FakePlatform::default());
        platform.fail_notice(PlatformError::DeliveryFailure("cannot send to user".into()));
        let enforcer = enforcer(&platform, EnforcerSettings::default());

        let report = enforcer
            .take_action(&message_from(GUILD, "x"), GUILD, &logged_config(), ViolationCategory::Flood)
            .await;

        assert!(!report.notified);
        assert!(report.logged);
    }

    #[tokio::test]
    async fn no_log_channel_means_no_entry() {
        let platform = Arc::new(FakePlatform::default());
        let enforcer = enforcer(&platform, EnforcerSettings::default());
        let config = GuildModerationConfig {
            enabled: true,
            ..Default::default()
        };

        let report = enforcer
            .take_action(&message_from(GUILD, "x"), GUILD, &config, ViolationCategory::ExcessiveEmoji)
            .await;

        assert!(!report.logged);
        assert!(platform.log_entries().is_empty());
    }

    #[tokio::test]
    async fn long_bodies_are_truncated_in_the_log() {
        let platform = Arc::new(FakePlatform::default());
        let enforcer = enforcer(&platform, EnforcerSettings::default());
        let body = "a".repeat(1500);

        enforcer
            .take_action(&message_from(GUILD, &body), GUILD, &logged_config(), ViolationCategory::Flood)
            .await;

        let content = &platform.log_entries()[0].1.content;
        assert_eq!(content.chars().count(), 1024);
        assert!(content.ends_with("..."));
    }

    #[tokio::test]
    async fn repeated_spam_doubles_the_timeout() {
        let platform = Arc::new(FakePlatform::default());
        let enforcer = enforcer(&platform, EnforcerSettings::default());
        let msg = message_from(GUILD, "x");
        let config = logged_config();

        let first = enforcer.take_action(&msg, GUILD, &config, ViolationCategory::Spam).await;
        let second = enforcer.take_action(&msg, GUILD, &config, ViolationCategory::Spam).await;

        assert_eq!(
            first.timeout,
            Some(AppliedTimeout {
                duration: Duration::from_secs(300),
                extended: false
            })
        );
        assert_eq!(
            second.timeout,
            Some(AppliedTimeout {
                duration: Duration::from_secs(600),
                extended: true
            })
        );
        assert_eq!(platform.timeouts().len(), 2);
        assert_eq!(platform.notices()[0].timeout, first.timeout);
    }

    #[tokio::test]
    async fn concurrent_spam_verdicts_escalate_once() {
        let platform = Arc::new(FakePlatform::default());
        let enforcer = enforcer(&platform, EnforcerSettings::default());
        let msg = message_from(GUILD, "x");
        let config = logged_config();

        let (a, b) = tokio::join!(
            enforcer.take_action(&msg, GUILD, &config, ViolationCategory::Spam),
            enforcer.take_action(&msg, GUILD, &config, ViolationCategory::Spam),
        );

        let mut extended = [a.timeout.unwrap().extended, b.timeout.unwrap().extended];
        extended.sort();
        assert_eq!(extended, [false, true]);
        assert_eq!(platform.timeouts().len(), 2);
    }

    #[tokio::test]
    async fn failed_timeout_does_not_count_as_prior_offense() {
        let platform = Arc::new(FakePlatform::default());
        let enforcer = enforcer(&platform, EnforcerSettings::default());
        let msg = message_from(GUILD, "x");

        platform.fail_timeout(PlatformError::Request("gateway hiccup".into()));
        let failed = enforcer.take_action(&msg, GUILD, &logged_config(), ViolationCategory::Spam).await;
        assert_eq!(failed.timeout, None);

        platform.restore_timeout();
        let next = enforcer.take_action(&msg, GUILD, &logged_config(), ViolationCategory::Spam).await;
        assert_eq!(next.timeout.map(|t| t.extended), Some(false));
    }

    #[tokio::test]
    async fn missing_timeout_permission_posts_log_notice() {
        let platform = Arc::new(FakePlatform::default());
        platform.fail_timeout(PlatformError::PermissionDenied("missing MODERATE_MEMBERS".into()));
        let enforcer = enforcer(&platform, EnforcerSettings::default());

        let report = enforcer
            .take_action(&message_from(GUILD, "x"), GUILD, &logged_config(), ViolationCategory::Spam)
            .await;

        assert_eq!(report.timeout, None);
        assert!(report.deleted && report.logged);
        let notices = platform.log_notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].1.contains("Moderate Members"));
    }

    #[tokio::test]
    async fn spam_timeout_can_be_disabled() {
        let platform = Arc::new(FakePlatform::default());
        let settings = EnforcerSettings {
            spam_timeout: None,
            ..Default::default()
        };
        let enforcer = enforcer(&platform, settings);

        let report = enforcer
            .take_action(&message_from(GUILD, "x"), GUILD, &logged_config(), ViolationCategory::Spam)
            .await;

        assert_eq!(report.timeout, None);
        assert!(platform.timeouts().is_empty());
    }

    #[tokio::test]
    async fn zero_cooldown_notifies_every_time() {
        let platform = Arc::new(FakePlatform::default());
        let settings = EnforcerSettings {
            notice_cooldown: Duration::ZERO,
            ..Default::default()
        };
        let enforcer = enforcer(&platform, settings);
        let msg = message_from(GUILD, "x");

        for _ in 0..3 {
            enforcer
                .take_action(&msg, GUILD, &logged_config(), ViolationCategory::BannedWord)
                .await;
        }
        assert_eq!(platform.notices().len(), 3);
    }
}
