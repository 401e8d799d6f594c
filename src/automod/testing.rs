//! In-memory fakes for the platform and storage collaborators.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use twilight_model::id::Id;

use super::error::PlatformError;
use super::models::{
    ChannelId, GuildId, GuildModerationConfig, InboundMessage, MessageAuthor, MessageId, UserId,
};
use super::ports::{ConfigStorage, ConfigUpdate, DirectNotice, LogEntry, ModerationPlatform};

pub fn message_from(guild_id: GuildId, content: &str) -> InboundMessage {
    InboundMessage {
        id: Id::new(100),
        guild_id: Some(guild_id),
        channel_id: Id::new(10),
        author: MessageAuthor {
            id: Id::new(2),
            name: "alice".into(),
            is_bot: false,
            role_ids: Vec::new(),
        },
        content: content.into(),
    }
}

#[derive(Debug, Default)]
struct PlatformState {
    is_admin: bool,
    fail_admin_lookup: bool,
    admin_lookups: usize,
    delete_error: Option<PlatformError>,
    notice_error: Option<PlatformError>,
    timeout_error: Option<PlatformError>,
    deletions: Vec<(ChannelId, MessageId)>,
    notices: Vec<DirectNotice>,
    log_entries: Vec<(ChannelId, LogEntry)>,
    log_notices: Vec<(ChannelId, String)>,
    timeouts: Vec<(GuildId, UserId, DateTime<Utc>)>,
}

/// Records every call; failure modes are switched per operation.
#[derive(Debug, Default)]
pub struct FakePlatform {
    state: Mutex<PlatformState>,
}

impl FakePlatform {
    pub fn set_admin(&self, is_admin: bool) {
        self.state.lock().is_admin = is_admin;
    }

    pub fn fail_admin_lookup(&self, fail: bool) {
        self.state.lock().fail_admin_lookup = fail;
    }

    pub fn fail_delete(&self, error: PlatformError) {
        self.state.lock().delete_error = Some(error);
    }

    pub fn fail_notice(&self, error: PlatformError) {
        self.state.lock().notice_error = Some(error);
    }

    pub fn fail_timeout(&self, error: PlatformError) {
        self.state.lock().timeout_error = Some(error);
    }

    pub fn restore_timeout(&self) {
        self.state.lock().timeout_error = None;
    }

    pub fn admin_lookups(&self) -> usize {
        self.state.lock().admin_lookups
    }

    pub fn deletions(&self) -> Vec<(ChannelId, MessageId)> {
        self.state.lock().deletions.clone()
    }

    pub fn notices(&self) -> Vec<DirectNotice> {
        self.state.lock().notices.clone()
    }

    pub fn log_entries(&self) -> Vec<(ChannelId, LogEntry)> {
        self.state.lock().log_entries.clone()
    }

    pub fn log_notices(&self) -> Vec<(ChannelId, String)> {
        self.state.lock().log_notices.clone()
    }

    pub fn timeouts(&self) -> Vec<(GuildId, UserId, DateTime<Utc>)> {
        self.state.lock().timeouts.clone()
    }
}

#[async_trait]
impl ModerationPlatform for FakePlatform {
    async fn is_administrator(&self, _guild_id: GuildId, _user_id: UserId) -> Result<bool, PlatformError> {
        let mut state = self.state.lock();
        state.admin_lookups += 1;
        if state.fail_admin_lookup {
            return Err(PlatformError::Request("member lookup failed".into()));
        }
        Ok(state.is_admin)
    }

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        if let Some(e) = state.delete_error.clone() {
            return Err(e);
        }
        state.deletions.push((channel_id, message_id));
        Ok(())
    }

    async fn send_direct_notice(&self, _user_id: UserId, notice: &DirectNotice) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        if let Some(e) = state.notice_error.clone() {
            return Err(e);
        }
        state.notices.push(notice.clone());
        Ok(())
    }

    async fn post_log_entry(&self, channel_id: ChannelId, entry: &LogEntry) -> Result<(), PlatformError> {
        self.state.lock().log_entries.push((channel_id, entry.clone()));
        Ok(())
    }

    async fn post_log_notice(&self, channel_id: ChannelId, text: &str) -> Result<(), PlatformError> {
        self.state.lock().log_notices.push((channel_id, text.to_string()));
        Ok(())
    }

    async fn timeout_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        until: DateTime<Utc>,
    ) -> Result<(), PlatformError> {
        // Suspend once, like a real request, so concurrent callers interleave.
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        if let Some(e) = state.timeout_error.clone() {
            return Err(e);
        }
        state.timeouts.push((guild_id, user_id, until));
        Ok(())
    }
}

/// Storage that returns seeded rows and counts writes without applying them.
#[derive(Debug, Default)]
pub struct FakeStorage {
    rows: Mutex<Vec<(GuildId, GuildModerationConfig)>>,
    updates: Mutex<Vec<(GuildId, ConfigUpdate)>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl FakeStorage {
    pub fn seed(&self, guild_id: GuildId, config: GuildModerationConfig) {
        self.rows.lock().push((guild_id, config));
    }

    pub fn writes(&self) -> usize {
        self.updates.lock().len()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConfigStorage for FakeStorage {
    async fn persist(&self, guild_id: GuildId, update: &ConfigUpdate) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("storage unavailable");
        }
        self.updates.lock().push((guild_id, update.clone()));
        Ok(())
    }

    async fn load_all(&self) -> anyhow::Result<Vec<(GuildId, GuildModerationConfig)>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            anyhow::bail!("storage unavailable");
        }
        Ok(self.rows.lock().clone())
    }
}
