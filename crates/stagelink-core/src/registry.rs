//! Command registry: stores and looks up [`Command`] values by name.
//!
//! Lookups are exact and case-sensitive. Listing is always alphabetical,
//! which falls out of the `BTreeMap` storage. The registry is built once
//! from configuration; runtime `add`/`remove` mutations are in-memory only
//! and are lost on restart, since the config file is the durable source of
//! truth.

use std::collections::BTreeMap;

use stagelink_types::{CommandSpec, ConfigError};
use thiserror::Error;

use crate::command::Command;

/// A failed registry mutation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// `add` with a name that is already registered.
    #[error("Command `{0}` already exists")]
    Duplicate(String),

    /// `remove` with a name that is not registered.
    #[error("No command named `{0}`")]
    Absent(String),
}

/// Mapping from command name to [`Command`].
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Command>,
}

impl CommandRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the configured command specs.
    ///
    /// Fails on the first malformed entry, aborting startup; a config file
    /// with a bad argument kind never produces a half-populated registry.
    pub fn build(specs: &BTreeMap<String, CommandSpec>) -> Result<Self, ConfigError> {
        let mut commands = BTreeMap::new();
        for (name, spec) in specs {
            let command = Command::from_spec(name, spec)?;
            commands.insert(name.clone(), command);
        }
        Ok(Self { commands })
    }

    /// Look up a command by exact, case-sensitive name.
    ///
    /// Absence is not an error; it signals "unknown command" to the caller.
    pub fn lookup(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    /// Register a new argument-less command at runtime.
    pub fn add(&mut self, name: &str, payload: &str) -> Result<(), RegistryError> {
        if self.commands.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        self.commands
            .insert(name.to_string(), Command::runtime(name, payload));
        Ok(())
    }

    /// Remove a command by name.
    pub fn remove(&mut self, name: &str) -> Result<(), RegistryError> {
        if self.commands.remove(name).is_none() {
            return Err(RegistryError::Absent(name.to_string()));
        }
        Ok(())
    }

    /// Help lines for all commands, ordered by name ascending (case-sensitive
    /// ordinal, the `BTreeMap` iteration order).
    pub fn list(&self, verbose: bool) -> Vec<String> {
        self.commands
            .values()
            .map(|c| c.render_help(verbose))
            .collect()
    }

    /// Number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the registry holds no commands.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
