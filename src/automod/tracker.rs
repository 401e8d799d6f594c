//! Per-(guild, user) message windows for spam and flood detection.
//!
//! Both checks mutate state synchronously under one DashMap shard lock and
//! never hold it across an `.await`, so concurrent handlers for the same
//! author serialize and different authors do not contend.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use super::models::{GuildId, RateLimit, UserId};

type WindowKey = (GuildId, UserId);

/// Repetition counter for one exact message body.
#[derive(Debug, Clone, Copy)]
struct BodyCounter {
    count: u32,
    /// Set on the first occurrence and never extended.
    expires_at: Instant,
}

#[derive(Debug)]
struct UserMessageWindow {
    timestamps: VecDeque<Instant>,
    /// Interval used by the most recent spam check, for idle sweeping.
    spam_interval: Duration,
    bodies: HashMap<String, BodyCounter>,
}

impl UserMessageWindow {
    fn new() -> Self {
        Self {
            timestamps: VecDeque::new(),
            spam_interval: Duration::ZERO,
            bodies: HashMap::new(),
        }
    }

    fn prune_timestamps(&mut self, now: Instant, interval: Duration) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) < interval {
                break;
            }
            self.timestamps.pop_front();
        }
    }

    fn prune_bodies(&mut self, now: Instant) {
        self.bodies.retain(|_, counter| counter.expires_at > now);
    }

    fn is_idle(&self, now: Instant) -> bool {
        let timestamps_expired = self
            .timestamps
            .back()
            .is_none_or(|&last| now.saturating_duration_since(last) >= self.spam_interval);
        let bodies_expired = self.bodies.values().all(|c| c.expires_at <= now);
        timestamps_expired && bodies_expired
    }
}

/// Rolling message windows keyed by guild and author.
#[derive(Debug, Default)]
pub struct MessageTracker {
    windows: DashMap<WindowKey, UserMessageWindow>,
}

impl MessageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message at `now` and report whether the author reached
    /// `limit.count` messages inside the sliding interval.
    pub fn record_spam(&self, guild_id: GuildId, user_id: UserId, limit: RateLimit, now: Instant) -> bool {
        let interval = limit.interval();
        let mut window = self
            .windows
            .entry((guild_id, user_id))
            .or_insert_with(UserMessageWindow::new);

        window.spam_interval = interval;
        window.timestamps.push_back(now);
        window.prune_timestamps(now, interval);

        // Entries beyond `count` cannot change the verdict; drop the oldest.
        let cap = limit.count.max(1) as usize;
        while window.timestamps.len() > cap {
            window.timestamps.pop_front();
        }

        let count = window.timestamps.len();
        debug!(
            "Spam check: user {} in guild {}: {}/{} in {}s",
            user_id, guild_id, count, limit.count, limit.interval_secs
        );

        count >= limit.count as usize
    }

    /// Count an exact body and report whether it reached `limit.count`.
    ///
    /// The first occurrence of a body starts its lifetime; the whole entry is
    /// dropped once `limit.interval_secs` have elapsed since then, no matter
    /// how many repeats happened in between.
    pub fn record_flood(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        body: &str,
        limit: RateLimit,
        now: Instant,
    ) -> bool {
        let mut window = self
            .windows
            .entry((guild_id, user_id))
            .or_insert_with(UserMessageWindow::new);

        window.prune_bodies(now);

        let counter = window
            .bodies
            .entry(body.to_string())
            .or_insert_with(|| BodyCounter {
                count: 0,
                expires_at: now + limit.interval(),
            });
        counter.count += 1;
        let count = counter.count;

        debug!(
            "Flood check: user {} in guild {}: {}/{} repeats",
            user_id, guild_id, count, limit.count
        );

        count >= limit.count
    }

    /// Forget an author's recent timestamps (after a timeout was applied).
    pub fn clear_timestamps(&self, guild_id: GuildId, user_id: UserId) {
        if let Some(mut window) = self.windows.get_mut(&(guild_id, user_id)) {
            window.timestamps.clear();
        }
    }

    /// Drop windows holding nothing that can still influence a verdict.
    /// Returns the number of removed windows.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| !window.is_idle(now));
        before.saturating_sub(self.windows.len())
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    #[cfg(test)]
    fn timestamps(&self, guild_id: GuildId, user_id: UserId) -> Vec<Instant> {
        self.windows
            .get(&(guild_id, user_id))
            .map(|w| w.timestamps.iter().copied().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    fn body_count(&self, guild_id: GuildId, user_id: UserId, body: &str) -> Option<u32> {
        self.windows
            .get(&(guild_id, user_id))
            .and_then(|w| w.bodies.get(body).map(|c| c.count))
    }
}
