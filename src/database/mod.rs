//! Database module exports.

mod models;
mod mongo;
mod repository;

pub use models::AutomodDocument;
pub use mongo::Database;
pub use repository::AutomodRepository;
