//! Internationalization (i18n) module.
//!
//! Translation tables are embedded at compile time and resolved with
//! dot-notation keys, falling back to English and then to the key itself.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::Value;
use tracing::{info, warn};

/// Locale used when a requested one is missing or unsupported.
pub const DEFAULT_LOCALE: &str = "en";

/// Global translation store: LangCode -> nested key/text tree
static TRANSLATIONS: OnceLock<HashMap<&'static str, Value>> = OnceLock::new();

const SOURCES: &[(&str, &str)] = &[
    ("en", include_str!("en.json")),
    ("de", include_str!("de.json")),
];

fn load() -> HashMap<&'static str, Value> {
    let mut map = HashMap::new();
    for (lang, raw) in SOURCES {
        match serde_json::from_str(raw) {
            Ok(val) => {
                map.insert(*lang, val);
            }
            Err(e) => warn!("Translation table '{}' is malformed: {}", lang, e),
        }
    }
    map
}

fn store() -> &'static HashMap<&'static str, Value> {
    TRANSLATIONS.get_or_init(load)
}

/// Load translations eagerly so a malformed table shows up at startup.
pub fn init() {
    let store = store();
    let mut langs: Vec<&str> = store.keys().copied().collect();
    langs.sort_unstable();
    info!("Loaded translations: {}", langs.join(", "));
}

/// Get text for a key in a specific language.
/// Supports nested keys via dot notation, e.g., "automod.log.title".
pub fn get_text(lang: &str, key: &str) -> String {
    let store = store();

    if let Some(text) = store.get(lang).and_then(|val| resolve_key(val, key)) {
        return text;
    }

    if lang != DEFAULT_LOCALE
        && let Some(text) = store.get(DEFAULT_LOCALE).and_then(|val| resolve_key(val, key))
    {
        return text;
    }

    key.to_string()
}

fn resolve_key(val: &Value, key: &str) -> Option<String> {
    let mut current = val;
    for part in key.split('.') {
        current = current.get(part)?;
    }
    current.as_str().map(|s| s.to_string())
}

pub fn is_supported(lang: &str) -> bool {
    SOURCES.iter().any(|(code, _)| *code == lang)
}

/// Resolve the effective locale: the requested one when a table exists for it.
pub fn resolve_locale(requested: Option<&str>) -> String {
    match requested.map(str::trim).map(str::to_lowercase) {
        Some(lang) if is_supported(&lang) => lang,
        Some(lang) => {
            warn!("Unsupported locale '{}', using '{}'", lang, DEFAULT_LOCALE);
            DEFAULT_LOCALE.to_string()
        }
        None => DEFAULT_LOCALE.to_string(),
    }
}
