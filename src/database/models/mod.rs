//! Database models.

pub mod automod_config;

pub use automod_config::{AutomodDocument, to_bson_id};
