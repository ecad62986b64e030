//! Core relay pipeline: command registry, permission gate, dispatcher, and
//! the one-shot WebSocket relay client.
//!
//! This crate is platform-agnostic. Guild, channel, and role ids are plain
//! `u64`; inbound messages arrive as [`InboundMessage`] values; replies go
//! out through the [`Responder`] trait and payloads through the [`Relay`]
//! trait. The Discord glue in `stagelink-bot` implements both traits.

pub mod command;
pub mod dispatch;
pub mod permission;
pub mod registry;
pub mod relay;

pub use command::{ArgKind, ArgumentError, Command};
pub use dispatch::{Dispatcher, InboundMessage, Outcome, Responder};
pub use permission::{PermissionError, PermissionGate};
pub use registry::{CommandRegistry, RegistryError};
pub use relay::{Relay, RelayClient, RelayError};
