//! Bot module - Discord wiring around the moderation core.

pub mod dispatcher;
pub mod platform;
mod runtime;

pub use dispatcher::AppState;
pub use platform::TwilightPlatform;
pub use runtime::run;
