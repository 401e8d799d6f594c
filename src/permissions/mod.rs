//! Permission system for checking whether a member is an administrator.
//!
//! ## Features
//!
//! - Answers from the gateway cache when possible, HTTP otherwise
//! - Cached results (reduces API hits)
//! - Bot owners from `OWNER_IDS` are administrators everywhere
//!
//! ## Usage
//!
//! ```rust,ignore
//! let perms = Permissions::with_owners(http, gateway_cache, &registry, owner_ids);
//!
//! if perms.is_admin(guild_id, user_id).await? {
//!     // ...
//! }
//! ```

mod checker;

pub use checker::Permissions;
