//! Vigil binary: wires configuration, storage and the gateway together.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;
use twilight_cache_inmemory::{InMemoryCache, ResourceType};
use twilight_http::Client as HttpClient;

use vigil::automod::{AutoMod, ConfigStore, EnforcerSettings};
use vigil::bot::{self, AppState, TwilightPlatform};
use vigil::cache::CacheRegistry;
use vigil::config::Config;
use vigil::database::{AutomodRepository, Database};
use vigil::i18n;
use vigil::permissions::Permissions;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vigil=info,twilight_gateway=warn,twilight_http=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Vigil...");

    i18n::init();

    let config = Config::from_env()?;
    info!(
        "Configuration loaded (locale: {}, notice cooldown: {:?}, spam timeout: {:?})",
        config.locale, config.warning_cooldown, config.spam_timeout
    );

    if config.owner_ids.is_empty() {
        info!("No owner IDs configured (OWNER_IDS is empty)");
    } else {
        info!("Bot owners: {:?}", config.owner_ids);
    }

    // Connect to MongoDB
    info!("Connecting to MongoDB...");
    let db = Database::connect(&config.mongodb_uri, &config.mongodb_database).await?;

    let caches = CacheRegistry::new();

    // Settings are loaded once; afterwards the in-memory copy is authoritative.
    let store = Arc::new(ConfigStore::new(Arc::new(AutomodRepository::new(&db))));
    store.load().await?;

    let http = Arc::new(
        HttpClient::builder()
            .token(config.discord_token.clone())
            .timeout(Duration::from_secs(30))
            .build(),
    );
    let gateway_cache = Arc::new(
        InMemoryCache::builder()
            .resource_types(ResourceType::GUILD | ResourceType::ROLE | ResourceType::MEMBER)
            .build(),
    );

    let permissions = Permissions::with_owners(
        Arc::clone(&http),
        Arc::clone(&gateway_cache),
        &caches,
        config.owner_ids.clone(),
    );
    let platform = Arc::new(TwilightPlatform::new(Arc::clone(&http), permissions.clone()));

    let automod = Arc::new(AutoMod::new(
        store,
        platform,
        &caches,
        EnforcerSettings {
            locale: config.locale.clone(),
            notice_cooldown: config.warning_cooldown,
            spam_timeout: config.spam_timeout,
        },
    ));
    info!("AutoMod ready ({:?})", caches);

    let state = AppState {
        http,
        gateway_cache,
        permissions,
        automod,
    };

    bot::run(&config, state).await
}
