//! Discord implementation of the moderation platform.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use twilight_http::Client as HttpClient;
use twilight_http::error::ErrorType;
use twilight_model::channel::message::Embed;
use twilight_model::util::Timestamp;
use twilight_util::builder::embed::{EmbedBuilder, EmbedFieldBuilder};

use crate::automod::models::{ChannelId, GuildId, MessageId, UserId};
use crate::automod::ports::AppliedTimeout;
use crate::automod::{DirectNotice, LogEntry, ModerationPlatform, PlatformError};
use crate::i18n::get_text;
use crate::permissions::Permissions;
use crate::utils::format_duration;

const LOG_COLOR: u32 = 0xFF_A5_00;
const NOTICE_COLOR: u32 = 0xE7_4C_3C;

pub struct TwilightPlatform {
    http: Arc<HttpClient>,
    permissions: Permissions,
}

impl TwilightPlatform {
    pub fn new(http: Arc<HttpClient>, permissions: Permissions) -> Self {
        Self { http, permissions }
    }
}

/// Map an HTTP failure onto the moderation taxonomy.
///
/// `forbidden` decides what a 403 means for the calling operation.
fn map_http_error(error: &twilight_http::Error, forbidden: fn(String) -> PlatformError) -> PlatformError {
    match error.kind() {
        ErrorType::Response { status, .. } if status.get() == 404 => PlatformError::NotFound,
        ErrorType::Response { status, .. } if status.get() == 403 => forbidden(error.to_string()),
        _ => PlatformError::Request(error.to_string()),
    }
}

fn to_timestamp(at: DateTime<Utc>) -> Result<Timestamp, PlatformError> {
    Timestamp::from_micros(at.timestamp_micros())
        .map_err(|e| PlatformError::Request(format!("invalid timestamp: {e}")))
}

fn timeout_text(locale: &str, timeout: &AppliedTimeout) -> String {
    let key = if timeout.extended {
        "automod.notice.extended"
    } else {
        "automod.notice.timeout"
    };
    get_text(locale, key).replace("{duration}", &format_duration(locale, timeout.duration))
}

/// Embed sent privately to the author.
pub fn notice_embed(notice: &DirectNotice) -> Embed {
    let locale = notice.locale.as_str();
    let mut description = get_text(locale, "automod.notice.body").replace("{reason}", &notice.reason);
    if let Some(timeout) = &notice.timeout {
        description.push_str("\n\n");
        description.push_str(&timeout_text(locale, timeout));
    }

    EmbedBuilder::new()
        .title(get_text(locale, "automod.notice.title"))
        .description(description)
        .color(NOTICE_COLOR)
        .build()
}

/// Embed written to the guild log channel.
pub fn log_embed(entry: &LogEntry) -> Embed {
    let locale = entry.locale.as_str();
    let label = |key: &str| get_text(locale, &format!("automod.log.{key}"));

    let content = if entry.content.trim().is_empty() {
        label("empty_content")
    } else {
        entry.content.clone()
    };

    let mut builder = EmbedBuilder::new()
        .title(label("title"))
        .color(LOG_COLOR)
        .field(
            EmbedFieldBuilder::new(label("user"), format!("<@{}> ({})", entry.author_id, entry.author_name))
                .inline(),
        )
        .field(EmbedFieldBuilder::new(label("channel"), format!("<#{}>", entry.channel_id)).inline())
        .field(EmbedFieldBuilder::new(label("violation"), entry.reason.clone()).inline());

    if let Some(timeout) = &entry.timeout {
        builder = builder.field(
            EmbedFieldBuilder::new(label("timeout"), format_duration(locale, timeout.duration)).inline(),
        );
    }

    builder = builder.field(EmbedFieldBuilder::new(label("content"), content));

    if let Ok(timestamp) = to_timestamp(entry.timestamp) {
        builder = builder.timestamp(timestamp);
    }

    builder.build()
}

#[async_trait]
impl ModerationPlatform for TwilightPlatform {
    async fn is_administrator(&self, guild_id: GuildId, user_id: UserId) -> Result<bool, PlatformError> {
        self.permissions
            .is_admin(guild_id, user_id)
            .await
            .map_err(|e| PlatformError::Request(format!("{e:#}")))
    }

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<(), PlatformError> {
        self.http
            .delete_message(channel_id, message_id)
            .await
            .map_err(|e| map_http_error(&e, PlatformError::PermissionDenied))?;
        Ok(())
    }

    async fn send_direct_notice(&self, user_id: UserId, notice: &DirectNotice) -> Result<(), PlatformError> {
        let channel = self
            .http
            .create_private_channel(user_id)
            .await
            .map_err(|e| map_http_error(&e, PlatformError::DeliveryFailure))?
            .model()
            .await
            .map_err(|e| PlatformError::Request(e.to_string()))?;

        self.http
            .create_message(channel.id)
            .embeds(&[notice_embed(notice)])
            .await
            .map_err(|e| map_http_error(&e, PlatformError::DeliveryFailure))?;
        Ok(())
    }

    async fn post_log_entry(&self, channel_id: ChannelId, entry: &LogEntry) -> Result<(), PlatformError> {
        self.http
            .create_message(channel_id)
            .embeds(&[log_embed(entry)])
            .await
            .map_err(|e| map_http_error(&e, PlatformError::PermissionDenied))?;
        Ok(())
    }

    async fn post_log_notice(&self, channel_id: ChannelId, text: &str) -> Result<(), PlatformError> {
        self.http
            .create_message(channel_id)
            .content(text)
            .await
            .map_err(|e| map_http_error(&e, PlatformError::PermissionDenied))?;
        Ok(())
    }

    async fn timeout_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        until: DateTime<Utc>,
    ) -> Result<(), PlatformError> {
        let until = to_timestamp(until)?;
        self.http
            .update_guild_member(guild_id, user_id)
            .communication_disabled_until(Some(until))
            .await
            .map_err(|e| map_http_error(&e, PlatformError::PermissionDenied))?;
        Ok(())
    }
}
