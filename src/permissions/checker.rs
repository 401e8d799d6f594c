//! Administrator checks with caching.

use std::sync::Arc;

use anyhow::Context;
use tracing::debug;
use twilight_cache_inmemory::InMemoryCache;
use twilight_http::Client as HttpClient;
use twilight_model::guild::Permissions as RolePermissions;
use twilight_model::id::Id;

use crate::automod::models::{GuildId, RoleId, UserId};
use crate::cache::{CacheConfig, CacheRegistry, TypedCache};

/// Cache key for admin lookups.
type AdminCacheKey = (GuildId, UserId);

/// Administrator checker backed by the gateway cache, with an HTTP fallback.
///
/// Bot owners (from OWNER_IDS env) count as administrators everywhere.
#[derive(Clone)]
pub struct Permissions {
    http: Arc<HttpClient>,
    gateway_cache: Arc<InMemoryCache>,
    cache: TypedCache<AdminCacheKey, bool>,
    /// Bot owner IDs - administrators in every guild.
    owner_ids: Vec<u64>,
}

impl Permissions {
    pub fn with_owners(
        http: Arc<HttpClient>,
        gateway_cache: Arc<InMemoryCache>,
        cache_registry: &CacheRegistry,
        owner_ids: Vec<u64>,
    ) -> Self {
        let cache = cache_registry.get_or_create("admin_permissions", CacheConfig::admin_lookups());

        Self {
            http,
            gateway_cache,
            cache,
            owner_ids,
        }
    }

    /// Check if a user is a bot owner.
    #[inline]
    pub fn is_bot_owner(&self, user_id: UserId) -> bool {
        self.owner_ids.contains(&user_id.get())
    }

    /// Whether the user is the guild owner or holds a role with `ADMINISTRATOR`.
    /// Bot owners always return true.
    pub async fn is_admin(&self, guild_id: GuildId, user_id: UserId) -> anyhow::Result<bool> {
        if self.is_bot_owner(user_id) {
            debug!("User {} is bot owner, treating as admin", user_id);
            return Ok(true);
        }

        let cache_key = (guild_id, user_id);
        if let Some(cached) = self.cache.get(&cache_key) {
            debug!("Admin cache hit for user {} in guild {}", user_id, guild_id);
            return Ok(cached);
        }

        let is_admin = match self.cached_is_admin(guild_id, user_id) {
            Some(is_admin) => is_admin,
            None => {
                debug!("Admin cache miss for user {} in guild {}, asking API", user_id, guild_id);
                self.fetch_is_admin(guild_id, user_id).await?
            }
        };

        self.cache.insert(cache_key, is_admin);
        Ok(is_admin)
    }

    /// `None` when the guild or the member is not in the gateway cache.
    fn cached_is_admin(&self, guild_id: GuildId, user_id: UserId) -> Option<bool> {
        let owner_id = self.gateway_cache.guild(guild_id)?.owner_id();
        let member_roles = self.gateway_cache.member(guild_id, user_id)?.roles().to_vec();

        Some(has_administrator(guild_id, owner_id, user_id, &member_roles, |role_id| {
            self.gateway_cache
                .role(role_id)
                .map(|role| role.resource().permissions)
        }))
    }

    async fn fetch_is_admin(&self, guild_id: GuildId, user_id: UserId) -> anyhow::Result<bool> {
        let member = self
            .http
            .guild_member(guild_id, user_id)
            .await
            .context("failed to fetch guild member")?
            .model()
            .await?;
        let guild = self
            .http
            .guild(guild_id)
            .await
            .context("failed to fetch guild")?
            .model()
            .await?;

        Ok(has_administrator(guild_id, guild.owner_id, user_id, &member.roles, |role_id| {
            guild
                .roles
                .iter()
                .find(|role| role.id == role_id)
                .map(|role| role.permissions)
        }))
    }

    /// Forget a cached answer, e.g. after a role update.
    pub fn invalidate(&self, guild_id: GuildId, user_id: UserId) {
        self.cache.invalidate(&(guild_id, user_id));
        debug!("Invalidated admin cache for user {} in guild {}", user_id, guild_id);
    }
}

/// Owner, or any held role (including `@everyone`, whose id equals the
/// guild id) granting `ADMINISTRATOR`.
fn has_administrator(
    guild_id: GuildId,
    owner_id: UserId,
    user_id: UserId,
    member_roles: &[RoleId],
    role_permissions: impl Fn(RoleId) -> Option<RolePermissions>,
) -> bool {
    if owner_id == user_id {
        return true;
    }

    let everyone: RoleId = Id::new(guild_id.get());
    std::iter::once(everyone)
        .chain(member_roles.iter().copied())
        .filter_map(&role_permissions)
        .any(|perms| perms.contains(RolePermissions::ADMINISTRATOR))
}
