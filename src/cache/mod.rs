//! Cache module - named, typed caches backed by Moka.
//!
//! The registry hands out `TypedCache` handles by name so the enforcement
//! path and the permission checker can share one place that owns every
//! in-process cache.
//!
//! ```rust,ignore
//! let cooldowns = registry.get_or_create::<CooldownKey, ()>(
//!     "automod_notice_cooldowns",
//!     CacheConfig::expiring(Duration::from_secs(60)),
//! );
//!
//! if cooldowns.insert_if_absent(key, ()) {
//!     // first notice inside the window
//! }
//! ```

mod config;
mod registry;
mod typed;

pub use config::CacheConfig;
pub use registry::CacheRegistry;
pub use typed::TypedCache;
