//! Stagelink: relays chat commands from Discord to a local automation
//! endpoint over one-shot WebSocket frames.
//!
//! This binary is glue only. Configuration loading lives in
//! `stagelink-types`, the whole dispatch pipeline in `stagelink-core`, and
//! this crate translates between the Discord gateway and those pieces.

mod gateway;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use serenity::all::{Client, GatewayIntents};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use stagelink_core::{CommandRegistry, Dispatcher, PermissionGate, RelayClient};
use stagelink_types::Settings;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("stagelink.toml"));

    if let Err(e) = run(&config_path).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

async fn run(config_path: &std::path::Path) -> anyhow::Result<()> {
    let settings = Settings::load(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    let registry =
        CommandRegistry::build(&settings.commands).context("building command registry")?;
    info!(
        config = %config_path.display(),
        commands = registry.len(),
        guilds = settings.guilds.len(),
        "configuration loaded"
    );

    let gate = PermissionGate::new(settings.guilds.clone());
    let relay = RelayClient::with_timeout(
        settings.bot.socket.clone(),
        Duration::from_secs(settings.bot.relay_timeout_secs),
    );
    info!(endpoint = relay.endpoint(), "relay client ready");
    let dispatcher = Dispatcher::new(registry, gate, relay);
    let handler = gateway::Handler::new(dispatcher, settings.guilds);

    let intents =
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(&settings.bot.token, intents)
        .event_handler(handler)
        .await
        .context("creating gateway client")?;

    info!("starting gateway client");
    client.start().await.context("gateway client exited")?;
    Ok(())
}
