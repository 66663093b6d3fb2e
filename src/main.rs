// This is the entry point of the Discord archiver.
//
// **Architecture Overview:**
// - `core/` = Archive logic (platform-agnostic): log rotation, media, user state
// - `infra/` = Implementations of core ports (JSON files, HTTP downloads)
// - `discord/` = Discord-specific adapters (events, transport)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Start the background snapshot sweep and handle shutdown

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use crate::config::AppConfig;
use crate::core::archive::{
    ArchiveClock, ArchiveService, LogBook, MediaArchiver, PathResolver, StorageRoots,
};
use crate::core::commands::CommandRouter;
use crate::core::users::{run_sweep, spawn_snapshot_sweep, UserStateStore};
use crate::discord::archive::{events as archive_events, members as member_events};
use crate::discord::archive::CacheMemberSource;
use crate::discord::{Data, Error};
use crate::infra::media::HttpAttachmentFetcher;
use crate::infra::users::JsonUserRecordStore;
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tokio::sync::watch;

/// Event handler for non-command Discord events.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            archive_events::handle_message(ctx, data, new_message).await;
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            member_events::handle_member_join(ctx, data, new_member).await;
        }
        serenity::FullEvent::GuildMemberUpdate { event, .. } => {
            member_events::handle_member_update(ctx, data, event).await;
        }
        serenity::FullEvent::PresenceUpdate { new_data } => {
            member_events::handle_presence_update(ctx, data, new_data).await;
        }
        serenity::FullEvent::CacheReady { guilds } => {
            // Startup snapshot: record every member we can see right away.
            tracing::info!("Cache ready for {} guilds, taking user snapshot", guilds.len());
            let users = Arc::clone(&data.users);
            let source = CacheMemberSource::new(ctx.cache.clone());
            tokio::spawn(async move {
                run_sweep(users.as_ref(), &source).await;
            });
        }

        _ => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let roots = StorageRoots::under(&config.archive_root);
    for dir in [&roots.logs, &roots.media, &roots.users] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create storage directory {}", dir.display()))?;
    }
    let clock = ArchiveClock::new(config.timezone);
    tracing::info!(
        root = %config.archive_root.display(),
        rotation = ?config.rotation,
        timezone = %clock.timezone(),
        privileged = config.privileged_users.len(),
        "Archive configured"
    );

    let resolver = Arc::new(PathResolver::new(roots.clone()));
    let archive = Arc::new(ArchiveService::new(
        LogBook::new(Arc::clone(&resolver), config.rotation),
        MediaArchiver::new(Arc::clone(&resolver)),
        HttpAttachmentFetcher::new().context("Failed to build HTTP client")?,
        CommandRouter::new(config.privileged_users.iter().copied()),
    ));

    let users = Arc::new(
        UserStateStore::load(JsonUserRecordStore::new(&roots.users))
            .await
            .context("Failed to load user records")?,
    );
    if users.is_empty() {
        tracing::info!("No user records yet; the first snapshot will create them");
    }

    let data = Data {
        archive: Arc::clone(&archive),
        users: Arc::clone(&users),
        clock,
    };

    // Flipped to true on Ctrl-C or when the gateway stops; the snapshot sweep watches it.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_PRESENCES;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            // Event handler for messages and member/presence changes
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |_ctx, ready, _framework| {
            Box::pin(async move {
                tracing::info!("Logged in as {}", ready.user.name);
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.token, intents)
        .framework(framework)
        .await
        .context("Error creating client")?;

    // Background sweep catches status changes that never fired an event.
    // Its first pass is a full interval away, long after the cache has filled.
    let sweep = spawn_snapshot_sweep(
        Arc::clone(&users),
        CacheMemberSource::new(client.cache.clone()),
        config.snapshot_interval,
        shutdown_rx,
    );

    let shard_manager = client.shard_manager.clone();
    let signal_tx = Arc::clone(&shutdown_tx);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        tracing::info!("Shutdown requested");
        let _ = signal_tx.send(true);
        shard_manager.shutdown_all().await;
    });

    let run = client.start().await;

    // Gateway is down: let a sweep in progress finish its writes, then flush
    // whatever is still open.
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweep.await {
        tracing::error!("Snapshot sweep task failed: {}", e);
    }
    archive.logs().close_all().await;
    tracing::info!(users = users.len(), "Archiver stopped");

    run.context("Error running bot")?;
    Ok(())
}
