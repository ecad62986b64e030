//! Configuration model and shared error types for Stagelink.
//!
//! Everything in this crate is plain data: the TOML configuration shapes,
//! the loader that reads them from disk, and the error type that startup
//! failures are reported through. No async, no network.

pub mod config;
pub mod error;

pub use config::{BotSettings, CommandSpec, GuildAuthorization, Settings};
pub use error::ConfigError;
