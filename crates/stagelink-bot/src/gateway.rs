//! Serenity event handler: translates gateway events into dispatcher calls.
//!
//! Each message event is mapped to a platform-agnostic
//! [`InboundMessage`] and handed to the core dispatcher; replies, ephemeral
//! notices, and success reactions flow back through a [`Responder`]
//! implementation holding the originating message. Serenity runs each event
//! as its own task, so messages are naturally concurrent and every relay
//! gets its own connection.
//!
//! On `ready`, every configured channel and role id is validated against
//! the live guild. A config that references ids the guild does not have is
//! a deployment mistake, so validation failure aborts the process rather
//! than limping along with a gate that can never match.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serenity::all::{
    ChannelId, ChannelType, Context, EventHandler, GuildId, Http, Message, Ready, RoleId,
};
use tracing::{debug, error, info, warn};

use stagelink_core::{Dispatcher, InboundMessage, RelayClient, Responder};
use stagelink_types::{ConfigError, GuildAuthorization};

/// How long ephemeral notices stay visible before deletion.
const EPHEMERAL_TTL: Duration = Duration::from_secs(30);
/// Reaction marking a successfully relayed command.
const ACK_REACTION: char = '\u{2705}';

/// Gateway event handler owning the dispatcher and the configured guild
/// table (kept for startup validation).
pub struct Handler {
    dispatcher: Dispatcher<RelayClient>,
    guilds: BTreeMap<u64, GuildAuthorization>,
}

impl Handler {
    pub fn new(
        dispatcher: Dispatcher<RelayClient>,
        guilds: BTreeMap<u64, GuildAuthorization>,
    ) -> Self {
        Self { dispatcher, guilds }
    }

    /// Check that every configured channel and role id resolves inside its
    /// guild. Channels must be text channels.
    async fn validate_guilds(&self, ctx: &Context) -> Result<(), ConfigError> {
        for (&guild_id, auth) in &self.guilds {
            let gid = GuildId::new(guild_id);

            let channels = ctx.http.get_channels(gid).await.map_err(|e| {
                ConfigError::Invalid(format!("cannot list channels for guild {guild_id}: {e}"))
            })?;
            for &channel in &auth.channels {
                let found = channels.iter().find(|c| c.id == ChannelId::new(channel));
                match found {
                    Some(c) if c.kind == ChannelType::Text => {}
                    _ => {
                        return Err(ConfigError::UnknownChannel {
                            guild: guild_id,
                            channel,
                        })
                    }
                }
            }

            let roles = ctx.http.get_guild_roles(gid).await.map_err(|e| {
                ConfigError::Invalid(format!("cannot list roles for guild {guild_id}: {e}"))
            })?;
            for &role in &auth.roles {
                if !roles.iter().any(|r| r.id == RoleId::new(role)) {
                    return Err(ConfigError::UnknownRole {
                        guild: guild_id,
                        role,
                    });
                }
            }

            info!(
                guild = guild_id,
                channels = auth.channels.len(),
                roles = auth.roles.len(),
                "guild authorization verified"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            user = %ready.user.name,
            guilds = ready.guilds.len(),
            "gateway session established"
        );

        for guild in &ready.guilds {
            if !self.guilds.contains_key(&guild.id.get()) {
                info!(guild = guild.id.get(), "no config for guild, not listening");
            }
        }

        if let Err(e) = self.validate_guilds(&ctx).await {
            error!("startup validation failed: {e}");
            std::process::exit(1);
        }
        info!("configuration validated against all connected guilds");
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let author_roles: Vec<u64> = msg
            .member
            .as_ref()
            .map(|m| m.roles.iter().map(|r| r.get()).collect())
            .unwrap_or_default();

        let inbound = InboundMessage {
            author: msg.author.tag(),
            author_is_bot: msg.author.bot,
            guild: msg.guild_id.map(GuildId::get),
            channel: msg.channel_id.get(),
            author_roles,
            content: msg.content.clone(),
        };

        let responder = ChannelResponder {
            http: Arc::clone(&ctx.http),
            message: msg,
        };
        let outcome = self.dispatcher.dispatch(&inbound, &responder).await;
        debug!(?outcome, author = %inbound.author, "message handled");
    }
}

/// [`Responder`] backed by the originating Discord message.
///
/// Delivery failures are logged and swallowed: a reply that cannot be sent
/// must never take down the pipeline or affect other messages.
struct ChannelResponder {
    http: Arc<Http>,
    message: Message,
}

#[async_trait]
impl Responder for ChannelResponder {
    async fn notify(&self, text: &str) {
        match self.message.channel_id.say(&self.http, text).await {
            Ok(reply) => {
                let http = Arc::clone(&self.http);
                tokio::spawn(async move {
                    tokio::time::sleep(EPHEMERAL_TTL).await;
                    if let Err(e) = reply.delete(&http).await {
                        debug!("could not remove ephemeral notice: {e}");
                    }
                });
            }
            Err(e) => warn!("could not send notice: {e}"),
        }
    }

    async fn reply(&self, text: &str) {
        if let Err(e) = self.message.channel_id.say(&self.http, text).await {
            warn!("could not send reply: {e}");
        }
    }

    async fn acknowledge(&self) {
        if let Err(e) = self.message.react(&self.http, ACK_REACTION).await {
            warn!("could not add ack reaction: {e}");
        }
    }
}
