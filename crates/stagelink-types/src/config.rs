//! TOML configuration for the relay bot.
//!
//! A config file has three sections:
//!
//! ```toml
//! [bot]
//! token = "discord-bot-token"
//! socket = "ws://127.0.0.1:8000/stagelink"
//!
//! [guilds.120987654321098765]
//! channels = [220987654321098765]
//! roles = [320987654321098765]
//!
//! [commands]
//! wave = "Make the avatar wave"
//! jump = { ws = "jump", help = "Jump N times", arg = "<int>" }
//! ```
//!
//! Command entries come in two shapes: a plain help string (the payload is
//! the command name itself, no argument), or a table with an optional payload
//! override (`ws`), help text, and argument kind. Guild table keys are the
//! decimal guild ids, as TOML keys are always strings.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Maximum config file size in bytes. Anything larger is rejected rather
/// than parsed.
const MAX_CONFIG_FILE_SIZE: u64 = 256 * 1024;

/// Connection settings for the chat platform and the relay endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BotSettings {
    /// Discord bot token.
    pub token: String,
    /// WebSocket endpoint payloads are relayed to.
    pub socket: String,
    /// Timeout in seconds for each relay connect/send/close step.
    #[serde(default = "default_relay_timeout_secs")]
    pub relay_timeout_secs: u64,
}

fn default_relay_timeout_secs() -> u64 {
    5
}

/// Per-guild authorization: which channels commands may be issued from and
/// which roles may issue them.
///
/// A guild with no entry at all is entirely unmonitored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuildAuthorization {
    /// Channel ids commands are accepted in.
    #[serde(default)]
    pub channels: Vec<u64>,
    /// Role ids allowed to issue commands.
    #[serde(default)]
    pub roles: Vec<u64>,
}

/// The config-file shape of one command entry.
///
/// Either a bare help string or a table with payload/help/argument fields.
/// The argument kind token is validated when the command registry is built,
/// not here; serde only distinguishes the two shapes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CommandSpec {
    /// `name = "help text"`: payload is the command name, no argument.
    Plain(String),
    /// `name = { ws = "...", help = "...", arg = "<int>" }`.
    Detailed {
        /// Payload override. Defaults to the command name.
        #[serde(default)]
        ws: Option<String>,
        /// Help text shown in listings.
        #[serde(default)]
        help: Option<String>,
        /// Argument kind: `"<int>"` or `"<str>"`.
        #[serde(default)]
        arg: Option<String>,
    },
}

/// Raw deserialization target. Guild keys arrive as strings and are
/// converted to numeric ids in [`Settings::from_toml`].
#[derive(Debug, Deserialize)]
struct RawSettings {
    bot: BotSettings,
    #[serde(default)]
    guilds: BTreeMap<String, GuildAuthorization>,
    #[serde(default)]
    commands: BTreeMap<String, CommandSpec>,
}

/// Fully loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Platform and relay connection settings.
    pub bot: BotSettings,
    /// Guild id to authorization table. Guilds absent here are unmonitored.
    pub guilds: BTreeMap<u64, GuildAuthorization>,
    /// Command name to spec, as written in the config file.
    pub commands: BTreeMap<String, CommandSpec>,
}

impl Settings {
    /// Parse settings from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let raw: RawSettings = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: Path::new("<inline>").to_path_buf(),
            source: e,
        })?;
        Self::from_raw(raw)
    }

    /// Load settings from a TOML file on disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::TooLarge {
                path: path.to_path_buf(),
                limit: MAX_CONFIG_FILE_SIZE,
                actual: metadata.len(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let raw: RawSettings = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSettings) -> Result<Self, ConfigError> {
        let mut guilds = BTreeMap::new();
        for (key, auth) in raw.guilds {
            let id: u64 = key
                .parse()
                .map_err(|_| ConfigError::BadGuildKey { key: key.clone() })?;
            guilds.insert(id, auth);
        }

        for name in raw.commands.keys() {
            if name.is_empty() {
                return Err(ConfigError::EmptyCommandName);
            }
        }

        Ok(Self {
            bot: raw.bot,
            guilds,
            commands: raw.commands,
        })
    }
}
