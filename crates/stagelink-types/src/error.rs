//! Configuration error type.
//!
//! Every variant here is fatal: configuration problems abort startup rather
//! than being papered over at runtime. A malformed argument kind in a command
//! spec is rejected at load time, not silently ignored later.

use std::path::PathBuf;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is larger than the allowed maximum.
    #[error("config file {path} exceeds maximum size of {limit} bytes (actual: {actual} bytes)")]
    TooLarge { path: PathBuf, limit: u64, actual: u64 },

    /// The config file is not valid TOML or does not match the expected shape.
    #[error("malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A `[guilds]` table key is not a numeric guild id.
    #[error("guild key `{key}` is not a numeric guild id")]
    BadGuildKey { key: String },

    /// A command entry declares an argument kind other than `<int>` or `<str>`.
    #[error("command `{command}` has unknown argument kind `{token}` (expected \"<int>\" or \"<str>\")")]
    UnknownArgKind { command: String, token: String },

    /// A command entry has an empty name.
    #[error("command name must not be empty")]
    EmptyCommandName,

    /// A configured channel id does not resolve to a text channel in its guild.
    #[error("guild {guild}: configured channel {channel} does not resolve to a text channel")]
    UnknownChannel { guild: u64, channel: u64 },

    /// A configured role id does not exist in its guild.
    #[error("guild {guild}: configured role {role} not found")]
    UnknownRole { guild: u64, role: u64 },

    /// Catch-all for validation failures against the live platform.
    #[error("{0}")]
    Invalid(String),
}
