//! Guild/channel/role permission gate.
//!
//! A pure predicate over the static per-guild authorization table loaded
//! from configuration. Checks run in a fixed order (guild context, guild
//! known, role, channel) so a denial always names the first failing
//! condition. No side effects; callers decide whether a denial is logged
//! silently or surfaced.

use std::collections::BTreeMap;

use stagelink_types::GuildAuthorization;
use thiserror::Error;

/// Why a message was denied. The `Display` text is safe to show to users
/// on the admin path; trigger-path denials are never surfaced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PermissionError {
    /// The message did not originate in a guild.
    #[error("This command has to run in a server")]
    NoGuildContext,

    /// The guild has no authorization entry and is unmonitored.
    #[error("No configuration known for this server")]
    UnknownGuild { guild: u64 },

    /// The author shares no role with the guild's allowed-role set.
    #[error("This command is only for approved roles")]
    RoleDenied,

    /// The channel is not in the guild's allowed-channel set.
    #[error("This command only works in specific channels")]
    ChannelDenied,
}

/// Read-only view over the per-guild authorization table.
#[derive(Debug, Clone, Default)]
pub struct PermissionGate {
    guilds: BTreeMap<u64, GuildAuthorization>,
}

impl PermissionGate {
    /// Build a gate over the configured guild table.
    pub fn new(guilds: BTreeMap<u64, GuildAuthorization>) -> Self {
        Self { guilds }
    }

    /// Evaluate one message context against the authorization table.
    ///
    /// Check order is part of the contract: guild presence is validated
    /// before role and channel so error messages are unambiguous.
    pub fn check(
        &self,
        guild: Option<u64>,
        channel: u64,
        author_roles: &[u64],
    ) -> Result<(), PermissionError> {
        let guild = guild.ok_or(PermissionError::NoGuildContext)?;
        let auth = self
            .guilds
            .get(&guild)
            .ok_or(PermissionError::UnknownGuild { guild })?;

        if !author_roles.iter().any(|role| auth.roles.contains(role)) {
            return Err(PermissionError::RoleDenied);
        }
        if !auth.channels.contains(&channel) {
            return Err(PermissionError::ChannelDenied);
        }
        Ok(())
    }
}
