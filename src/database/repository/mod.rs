//! Repository module - data access layer.

mod automod_repository;

pub use automod_repository::AutomodRepository;
