//! Bot runtime - gateway shards, background sweeping and shutdown.

use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use twilight_gateway::{CloseFrame, Config as GatewayConfig, EventTypeFlags, Intents, Shard, StreamExt};

use super::dispatcher::{self, AppState};
use crate::config::Config;

/// Idle tracker windows are reclaimed this often.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

fn intents() -> Intents {
    Intents::GUILDS | Intents::GUILD_MEMBERS | Intents::GUILD_MESSAGES | Intents::MESSAGE_CONTENT
}

/// Run every recommended shard until Ctrl+C.
pub async fn run(config: &Config, state: AppState) -> anyhow::Result<()> {
    let gateway_config = GatewayConfig::new(config.discord_token.clone(), intents());
    let shards: Vec<Shard> =
        twilight_gateway::create_recommended(&state.http, gateway_config, |_, builder| builder.build())
            .await
            .context("failed to create gateway shards")?
            .collect();

    info!("Starting {} shard(s)...", shards.len());

    let senders: Vec<_> = shards.iter().map(Shard::sender).collect();
    let mut tasks = JoinSet::new();
    for shard in shards {
        tasks.spawn(shard_runner(shard, state.clone()));
    }

    let sweeper = tokio::spawn(sweep_loop(state.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Shutting down...");

    sweeper.abort();
    for sender in senders {
        if sender.close(CloseFrame::NORMAL).is_err() {
            debug!("Shard already closed");
        }
    }
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!("Shard task failed: {}", e);
        }
    }

    Ok(())
}

async fn shard_runner(mut shard: Shard, state: AppState) {
    let shard_id = shard.id().number();
    info!("Shard {} started", shard_id);

    while let Some(item) = shard.next_event(EventTypeFlags::all()).await {
        match item {
            Ok(event) => {
                state.gateway_cache.update(&event);
                dispatcher::dispatch(&state, event);
            }
            Err(e) => {
                warn!("Shard {} failed to receive event: {}", shard_id, e);
            }
        }
    }

    info!("Shard {} event loop ended", shard_id);
}

async fn sweep_loop(state: AppState) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        let removed = state.automod.sweep();
        debug!(
            "Swept {} idle tracker windows ({} remain)",
            removed,
            state.automod.tracker().len()
        );
    }
}
