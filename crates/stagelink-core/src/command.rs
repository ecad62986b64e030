//! Relayable command definitions and argument resolution.
//!
//! A [`Command`] is an immutable value: a name, help text, a payload
//! template, and an argument kind. Both config-file shapes (plain help
//! string or detailed table) normalize into this one type, and the argument
//! kind token is validated exactly once, at construction.

use stagelink_types::{CommandSpec, ConfigError};
use thiserror::Error;

/// Config token selecting a validated integer argument.
pub const ARG_TOKEN_INT: &str = "<int>";
/// Config token selecting a free-text argument.
pub const ARG_TOKEN_TEXT: &str = "<str>";

/// What kind of argument a command accepts after its name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArgKind {
    /// No argument; anything after the name is ignored.
    #[default]
    None,
    /// Exactly one token that must parse as an integer.
    Integer,
    /// Everything after the command name, spaces included.
    Text,
}

/// A missing or malformed argument for a parameterized command.
///
/// The `Display` text is shown to the invoking user verbatim, so it names
/// the command and what was expected, nothing more.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArgumentError {
    /// The command requires an argument and none was given.
    #[error("No argument given for `{command}` (expected {expected})")]
    Missing {
        command: String,
        expected: &'static str,
    },

    /// The command requires an integer and the token did not parse as one.
    #[error("`{token}` is not an integer (command `{command}` expects one)")]
    NotAnInteger { command: String, token: String },
}

/// One relayable action: name, help text, payload template, argument kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    help: String,
    payload: String,
    arg: ArgKind,
}

impl Command {
    /// Normalize a config entry into a `Command`.
    ///
    /// Plain-string specs become argument-less commands whose payload is the
    /// command name. Detailed specs may override the payload (`ws`) and
    /// declare an argument kind; an unrecognized argument token is a fatal
    /// configuration error.
    pub fn from_spec(name: &str, spec: &CommandSpec) -> Result<Self, ConfigError> {
        if name.is_empty() {
            return Err(ConfigError::EmptyCommandName);
        }

        match spec {
            CommandSpec::Plain(help) => Ok(Self {
                name: name.to_string(),
                help: help.clone(),
                payload: name.to_string(),
                arg: ArgKind::None,
            }),
            CommandSpec::Detailed { ws, help, arg } => {
                let arg = match arg.as_deref() {
                    None => ArgKind::None,
                    Some(ARG_TOKEN_INT) => ArgKind::Integer,
                    Some(ARG_TOKEN_TEXT) => ArgKind::Text,
                    Some(token) => {
                        return Err(ConfigError::UnknownArgKind {
                            command: name.to_string(),
                            token: token.to_string(),
                        })
                    }
                };
                Ok(Self {
                    name: name.to_string(),
                    help: help.clone().unwrap_or_default(),
                    payload: ws.clone().unwrap_or_else(|| name.to_string()),
                    arg,
                })
            }
        }
    }

    /// Build a command added at runtime through the admin `add` operation.
    ///
    /// Runtime commands take no argument and are lost on restart; the config
    /// file remains the durable source of truth.
    pub fn runtime(name: &str, payload: &str) -> Self {
        Self {
            name: name.to_string(),
            help: "added at runtime".to_string(),
            payload: payload.to_string(),
            arg: ArgKind::None,
        }
    }

    /// The command name (the leading token of a trigger message).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The payload template before any argument is appended.
    pub fn payload_template(&self) -> &str {
        &self.payload
    }

    /// The argument kind this command accepts.
    pub fn arg_kind(&self) -> ArgKind {
        self.arg
    }

    /// One-line description for listings. Verbose mode appends the literal
    /// payload template.
    pub fn render_help(&self, verbose: bool) -> String {
        let mut line = format!("{}: {}", self.name, self.help);
        if verbose {
            line.push_str(&format!(" (sends: {})", self.payload));
        }
        line
    }

    /// Resolve the final payload from the text remaining after the command
    /// name.
    ///
    /// - `Integer`: the first whitespace token of the remainder must be an
    ///   integer literal (optional sign, then digits); the payload is
    ///   `template + " " + token`. The token is validated lexically and
    ///   appended unchanged, so there is no value-range bound.
    /// - `Text`: the whole remainder (spaces included) is appended.
    /// - `None`: the remainder is ignored and the template returned as-is.
    pub fn resolve(&self, remainder: &str) -> Result<String, ArgumentError> {
        let remainder = remainder.trim();
        match self.arg {
            ArgKind::None => Ok(self.payload.clone()),
            ArgKind::Integer => {
                let token =
                    remainder
                        .split_whitespace()
                        .next()
                        .ok_or_else(|| ArgumentError::Missing {
                            command: self.name.clone(),
                            expected: "an integer",
                        })?;
                if !is_integer_literal(token) {
                    return Err(ArgumentError::NotAnInteger {
                        command: self.name.clone(),
                        token: token.to_string(),
                    });
                }
                Ok(format!("{} {token}", self.payload))
            }
            ArgKind::Text => {
                if remainder.is_empty() {
                    return Err(ArgumentError::Missing {
                        command: self.name.clone(),
                        expected: "text",
                    });
                }
                Ok(format!("{} {remainder}", self.payload))
            }
        }
    }
}

/// Whether `token` is an integer literal: an optional leading `+` or `-`
/// followed by one or more ASCII digits. Purely lexical, so arbitrarily
/// large values pass through to the endpoint untouched.
fn is_integer_literal(token: &str) -> bool {
    let digits = token
        .strip_prefix('+')
        .or_else(|| token.strip_prefix('-'))
        .unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
