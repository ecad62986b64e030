//! Dispatch pipeline: one inbound chat message in, at most one relayed
//! frame out.
//!
//! Every message runs the same staged pipeline
//! (`Received -> Filtered -> Authorized -> Parsed -> Resolved -> Relayed`)
//! with early exits for messages that are not commands, not authorized, or
//! malformed. The terminal state is returned as an [`Outcome`] so callers
//! and tests can assert where a message ended up.
//!
//! Two prefixes are recognized. `=` triggers a relay command; permission
//! denials on this path are logged at debug level and never surfaced, so
//! users cannot probe which channels and roles are gated. `?` invokes the
//! administrative operations (`list`, `add`, `delete`, `send`), which run
//! the same gate but report denials and failures back to the invoking user.

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info};

use crate::permission::PermissionGate;
use crate::registry::CommandRegistry;
use crate::relay::Relay;

/// Leading character identifying a relay command invocation.
pub const TRIGGER_PREFIX: char = '=';
/// Leading character identifying an administrative operation.
pub const ADMIN_PREFIX: char = '?';

/// Platform-agnostic view of one inbound chat message.
#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
    /// Display name of the author, for logs only.
    pub author: String,
    /// Whether the author is an automated account.
    pub author_is_bot: bool,
    /// Guild the message originated in, if any.
    pub guild: Option<u64>,
    /// Channel the message was posted to.
    pub channel: u64,
    /// Role ids held by the author in that guild.
    pub author_roles: Vec<u64>,
    /// Raw message text.
    pub content: String,
}

/// Terminal state of one dispatched message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not a command (bot author, wrong prefix, or empty command name).
    Ignored,
    /// The permission gate rejected the message.
    Denied,
    /// A user-visible error ended the pipeline (unknown command, bad
    /// argument, failed mutation, failed relay).
    Rejected,
    /// The payload was written to the relay endpoint.
    Relayed,
    /// An administrative operation completed.
    Handled,
}

/// Outbound side of the chat platform, as seen by the dispatcher.
///
/// Implementations deliver feedback into the originating channel. Delivery
/// failures are the implementation's problem (logged, never fatal); the
/// dispatcher treats all three operations as fire-and-forget.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Transient notice, auto-removed after a fixed interval.
    async fn notify(&self, text: &str);
    /// Plain reply that stays in the channel.
    async fn reply(&self, text: &str);
    /// Lightweight success marker on the original message.
    async fn acknowledge(&self);
}

/// Consumes inbound messages and drives them to a terminal state.
///
/// Owns the registry (behind a mutex, since the host runtime dispatches
/// messages concurrently) and the permission gate. The mutex guard is never
/// held across a relay or reply await: commands are cloned out before
/// resolution.
pub struct Dispatcher<R> {
    registry: Mutex<CommandRegistry>,
    gate: PermissionGate,
    relay: R,
}

impl<R: Relay> Dispatcher<R> {
    /// Create a dispatcher over a built registry, gate, and relay sink.
    pub fn new(registry: CommandRegistry, gate: PermissionGate, relay: R) -> Self {
        Self {
            registry: Mutex::new(registry),
            gate,
            relay,
        }
    }

    /// Lock the registry. Exposed for startup logging and tests.
    pub async fn registry(&self) -> MutexGuard<'_, CommandRegistry> {
        self.registry.lock().await
    }

    /// Run one message through the pipeline to its terminal state.
    pub async fn dispatch(&self, msg: &InboundMessage, responder: &dyn Responder) -> Outcome {
        if msg.author_is_bot {
            return Outcome::Ignored;
        }

        if let Some(rest) = msg.content.strip_prefix(TRIGGER_PREFIX) {
            self.dispatch_trigger(msg, rest, responder).await
        } else if let Some(rest) = msg.content.strip_prefix(ADMIN_PREFIX) {
            self.dispatch_admin(msg, rest, responder).await
        } else {
            Outcome::Ignored
        }
    }

    /// The `=`-prefixed relay path.
    async fn dispatch_trigger(
        &self,
        msg: &InboundMessage,
        rest: &str,
        responder: &dyn Responder,
    ) -> Outcome {
        let (name, remainder) = split_command(rest);
        if name.is_empty() {
            // A bare "=" is ordinary chat, not a command.
            return Outcome::Ignored;
        }

        if let Err(denial) = self.gate.check(msg.guild, msg.channel, &msg.author_roles) {
            debug!(author = %msg.author, %denial, "trigger denied, ignoring silently");
            return Outcome::Denied;
        }

        let command = self.registry.lock().await.lookup(name).cloned();
        let Some(command) = command else {
            responder
                .notify(&format!("Unknown command `{name}`"))
                .await;
            return Outcome::Rejected;
        };

        let payload = match command.resolve(remainder) {
            Ok(payload) => payload,
            Err(e) => {
                responder.notify(&e.to_string()).await;
                return Outcome::Rejected;
            }
        };

        self.relay_payload(msg, &payload, responder).await
    }

    /// The `?`-prefixed administrative path.
    ///
    /// Unlike the trigger path, gate denials and mutation failures are
    /// reported back to the invoking user.
    async fn dispatch_admin(
        &self,
        msg: &InboundMessage,
        rest: &str,
        responder: &dyn Responder,
    ) -> Outcome {
        let (op, remainder) = split_command(rest);
        if op.is_empty() {
            // A bare "?" is ordinary chat.
            return Outcome::Ignored;
        }

        if let Err(denial) = self.gate.check(msg.guild, msg.channel, &msg.author_roles) {
            debug!(author = %msg.author, op, %denial, "admin operation denied");
            responder.notify(&denial.to_string()).await;
            return Outcome::Denied;
        }

        match op {
            "list" => {
                let verbose = remainder.trim() == "verbose";
                let lines = self.registry.lock().await.list(verbose);
                let text = if lines.is_empty() {
                    "No commands configured".to_string()
                } else {
                    lines.join("\n")
                };
                responder.reply(&text).await;
                responder.acknowledge().await;
                Outcome::Handled
            }
            "add" => {
                let (name, payload) = split_command(remainder);
                let payload = payload.trim();
                if name.is_empty() || payload.is_empty() {
                    responder.notify("Usage: ?add <name> <payload>").await;
                    return Outcome::Rejected;
                }
                let result = self.registry.lock().await.add(name, payload);
                match result {
                    Ok(()) => {
                        info!(author = %msg.author, name, "command added at runtime");
                        responder.acknowledge().await;
                        Outcome::Handled
                    }
                    Err(e) => {
                        responder.notify(&e.to_string()).await;
                        Outcome::Rejected
                    }
                }
            }
            "delete" => {
                let (name, _) = split_command(remainder);
                if name.is_empty() {
                    responder.notify("Usage: ?delete <name>").await;
                    return Outcome::Rejected;
                }
                let result = self.registry.lock().await.remove(name);
                match result {
                    Ok(()) => {
                        info!(author = %msg.author, name, "command removed at runtime");
                        responder.acknowledge().await;
                        Outcome::Handled
                    }
                    Err(e) => {
                        responder.notify(&e.to_string()).await;
                        Outcome::Rejected
                    }
                }
            }
            "send" => {
                let text = remainder.trim();
                if text.is_empty() {
                    responder.notify("Usage: ?send <text>").await;
                    return Outcome::Rejected;
                }
                self.relay_payload(msg, text, responder).await
            }
            other => {
                responder
                    .notify(&format!("Unknown admin command `{other}`"))
                    .await;
                Outcome::Rejected
            }
        }
    }

    /// Hand a resolved payload to the relay and report the result.
    ///
    /// The user only ever sees a generic failure notice; the full transport
    /// cause goes to the server-side log.
    async fn relay_payload(
        &self,
        msg: &InboundMessage,
        payload: &str,
        responder: &dyn Responder,
    ) -> Outcome {
        match self.relay.relay(payload).await {
            Ok(()) => {
                debug!(author = %msg.author, payload, "payload relayed");
                responder.acknowledge().await;
                Outcome::Relayed
            }
            Err(e) => {
                error!(author = %msg.author, payload, error = %e, "relay failed");
                responder
                    .notify("Could not reach the relay endpoint")
                    .await;
                Outcome::Rejected
            }
        }
    }
}

/// Split input on the first whitespace run into `(first_token, remainder)`.
fn split_command(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim_start()),
        None => (input, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use stagelink_types::{CommandSpec, GuildAuthorization};

    use crate::relay::RelayError;

    const GUILD: u64 = 100;
    const CHANNEL: u64 = 200;
    const ROLE: u64 = 300;

    /// Relay fake that records payloads and can be told to fail.
    #[derive(Default)]
    struct RecordingRelay {
        sent: StdMutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Relay for RecordingRelay {
        async fn relay(&self, payload: &str) -> Result<(), RelayError> {
            if self.fail {
                return Err(RelayError::Timeout(std::time::Duration::from_secs(1)));
            }
            self.sent.lock().unwrap().push(payload.to_string());
            Ok(())
        }
    }

    /// Responder fake recording everything sent back to the channel.
    #[derive(Default)]
    struct RecordingResponder {
        notices: StdMutex<Vec<String>>,
        replies: StdMutex<Vec<String>>,
        acks: AtomicUsize,
    }

    #[async_trait]
    impl Responder for RecordingResponder {
        async fn notify(&self, text: &str) {
            self.notices.lock().unwrap().push(text.to_string());
        }
        async fn reply(&self, text: &str) {
            self.replies.lock().unwrap().push(text.to_string());
        }
        async fn acknowledge(&self) {
            self.acks.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl RecordingResponder {
        fn notices(&self) -> Vec<String> {
            self.notices.lock().unwrap().clone()
        }
        fn replies(&self) -> Vec<String> {
            self.replies.lock().unwrap().clone()
        }
        fn acks(&self) -> usize {
            self.acks.load(Ordering::SeqCst)
        }
    }

    fn specs() -> BTreeMap<String, CommandSpec> {
        let mut specs = BTreeMap::new();
        specs.insert(
            "wave".to_string(),
            CommandSpec::Plain("Make the avatar wave".to_string()),
        );
        specs.insert(
            "jump".to_string(),
            CommandSpec::Detailed {
                ws: Some("jump".to_string()),
                help: Some("Jump N times".to_string()),
                arg: Some("<int>".to_string()),
            },
        );
        specs
    }

    fn dispatcher() -> Dispatcher<RecordingRelay> {
        dispatcher_with(RecordingRelay::default())
    }

    fn dispatcher_with(relay: RecordingRelay) -> Dispatcher<RecordingRelay> {
        let registry = CommandRegistry::build(&specs()).unwrap();
        let mut guilds = BTreeMap::new();
        guilds.insert(
            GUILD,
            GuildAuthorization {
                channels: vec![CHANNEL],
                roles: vec![ROLE],
            },
        );
        Dispatcher::new(registry, PermissionGate::new(guilds), relay)
    }

    fn authorized(content: &str) -> InboundMessage {
        InboundMessage {
            author: "streamer#0001".to_string(),
            author_is_bot: false,
            guild: Some(GUILD),
            channel: CHANNEL,
            author_roles: vec![ROLE],
            content: content.to_string(),
        }
    }

    fn sent(d: &Dispatcher<RecordingRelay>) -> Vec<String> {
        d.relay.sent.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn authorized_trigger_with_integer_arg_relays_and_acks() {
        let d = dispatcher();
        let r = RecordingResponder::default();

        let outcome = d.dispatch(&authorized("=jump 3"), &r).await;

        assert_eq!(outcome, Outcome::Relayed);
        assert_eq!(sent(&d), vec!["jump 3"]);
        assert_eq!(r.acks(), 1);
        assert!(r.notices().is_empty());
    }

    #[tokio::test]
    async fn missing_argument_notifies_and_skips_relay() {
        let d = dispatcher();
        let r = RecordingResponder::default();

        let outcome = d.dispatch(&authorized("=jump"), &r).await;

        assert_eq!(outcome, Outcome::Rejected);
        assert!(sent(&d).is_empty());
        assert!(r.notices().iter().any(|n| n.contains("No argument")));
    }

    #[tokio::test]
    async fn unknown_command_gets_a_notice() {
        let d = dispatcher();
        let r = RecordingResponder::default();

        // "dance" is not configured.
        let outcome = d.dispatch(&authorized("=dance"), &r).await;

        assert_eq!(outcome, Outcome::Rejected);
        assert!(r.notices().iter().any(|n| n.contains("Unknown command")));
        assert!(sent(&d).is_empty());
    }

    #[tokio::test]
    async fn bot_authors_are_ignored() {
        let d = dispatcher();
        let r = RecordingResponder::default();

        let mut msg = authorized("=wave");
        msg.author_is_bot = true;

        assert_eq!(d.dispatch(&msg, &r).await, Outcome::Ignored);
        assert!(sent(&d).is_empty());
        assert_eq!(r.acks(), 0);
    }

    #[tokio::test]
    async fn unprefixed_messages_are_ignored() {
        let d = dispatcher();
        let r = RecordingResponder::default();

        assert_eq!(d.dispatch(&authorized("wave"), &r).await, Outcome::Ignored);
        assert_eq!(d.dispatch(&authorized("="), &r).await, Outcome::Ignored);
        assert_eq!(d.dispatch(&authorized("?"), &r).await, Outcome::Ignored);
    }

    #[tokio::test]
    async fn trigger_denial_is_silent() {
        let d = dispatcher();
        let r = RecordingResponder::default();

        let mut msg = authorized("=wave");
        msg.author_roles = vec![999];

        assert_eq!(d.dispatch(&msg, &r).await, Outcome::Denied);
        // Nothing is surfaced: gating must not be leaked.
        assert!(r.notices().is_empty());
        assert!(r.replies().is_empty());
        assert_eq!(r.acks(), 0);
        assert!(sent(&d).is_empty());
    }

    #[tokio::test]
    async fn relay_failure_surfaces_generic_notice() {
        let d = dispatcher_with(RecordingRelay {
            fail: true,
            ..RecordingRelay::default()
        });
        let r = RecordingResponder::default();

        let outcome = d.dispatch(&authorized("=wave"), &r).await;

        assert_eq!(outcome, Outcome::Rejected);
        assert_eq!(r.acks(), 0);
        let notices = r.notices();
        assert_eq!(notices.len(), 1);
        // Generic text only; the transport cause stays in the server log.
        assert!(notices[0].contains("relay endpoint"));
        assert!(!notices[0].contains("Timeout"));
    }

    #[tokio::test]
    async fn admin_list_replies_sorted() {
        let d = dispatcher();
        let r = RecordingResponder::default();

        let outcome = d.dispatch(&authorized("?list"), &r).await;

        assert_eq!(outcome, Outcome::Handled);
        let replies = r.replies();
        assert_eq!(replies.len(), 1);
        let lines: Vec<&str> = replies[0].lines().collect();
        assert!(lines[0].starts_with("jump:"));
        assert!(lines[1].starts_with("wave:"));
        // Non-verbose listing omits payload templates.
        assert!(!replies[0].contains("sends:"));
    }

    #[tokio::test]
    async fn admin_list_verbose_includes_payloads() {
        let d = dispatcher();
        let r = RecordingResponder::default();

        d.dispatch(&authorized("?list verbose"), &r).await;

        assert!(r.replies()[0].contains("(sends: jump)"));
    }

    #[tokio::test]
    async fn admin_add_registers_and_acks() {
        let d = dispatcher();
        let r = RecordingResponder::default();

        let outcome = d.dispatch(&authorized("?add spin spin fast"), &r).await;
        assert_eq!(outcome, Outcome::Handled);
        assert_eq!(r.acks(), 1);

        // The new command relays its payload with the argument text intact.
        let outcome = d.dispatch(&authorized("=spin"), &r).await;
        assert_eq!(outcome, Outcome::Relayed);
        assert_eq!(sent(&d), vec!["spin fast"]);
    }

    #[tokio::test]
    async fn admin_add_duplicate_is_a_user_facing_error() {
        let d = dispatcher();
        let r = RecordingResponder::default();

        let outcome = d.dispatch(&authorized("?add jump jump"), &r).await;

        assert_eq!(outcome, Outcome::Rejected);
        assert!(r.notices().iter().any(|n| n.contains("already exists")));
    }

    #[tokio::test]
    async fn admin_delete_then_trigger_is_unknown() {
        let d = dispatcher();
        let r = RecordingResponder::default();

        assert_eq!(
            d.dispatch(&authorized("?delete wave"), &r).await,
            Outcome::Handled
        );
        assert_eq!(
            d.dispatch(&authorized("=wave"), &r).await,
            Outcome::Rejected
        );
        assert!(r.notices().iter().any(|n| n.contains("Unknown command")));
    }

    #[tokio::test]
    async fn admin_delete_absent_is_a_user_facing_error() {
        let d = dispatcher();
        let r = RecordingResponder::default();

        let outcome = d.dispatch(&authorized("?delete dance"), &r).await;

        assert_eq!(outcome, Outcome::Rejected);
        assert!(r.notices().iter().any(|n| n.contains("No command named")));
    }

    #[tokio::test]
    async fn unauthorized_admin_delete_is_surfaced_and_leaves_registry_intact() {
        let d = dispatcher();
        let r = RecordingResponder::default();

        let mut msg = authorized("?delete wave");
        msg.author_roles = vec![999];

        assert_eq!(d.dispatch(&msg, &r).await, Outcome::Denied);
        // Admin denials are surfaced, unlike trigger denials.
        assert!(r.notices().iter().any(|n| n.contains("approved roles")));
        assert!(d.registry().await.lookup("wave").is_some());
    }

    #[tokio::test]
    async fn admin_send_relays_raw_text() {
        let d = dispatcher();
        let r = RecordingResponder::default();

        let outcome = d.dispatch(&authorized("?send model reset pose"), &r).await;

        assert_eq!(outcome, Outcome::Relayed);
        assert_eq!(sent(&d), vec!["model reset pose"]);
        assert_eq!(r.acks(), 1);
    }

    #[tokio::test]
    async fn unknown_admin_operation_gets_a_notice() {
        let d = dispatcher();
        let r = RecordingResponder::default();

        let outcome = d.dispatch(&authorized("?frobnicate"), &r).await;

        assert_eq!(outcome, Outcome::Rejected);
        assert!(r
            .notices()
            .iter()
            .any(|n| n.contains("Unknown admin command")));
    }

    #[tokio::test]
    async fn admin_add_without_payload_shows_usage() {
        let d = dispatcher();
        let r = RecordingResponder::default();

        let outcome = d.dispatch(&authorized("?add spin"), &r).await;

        assert_eq!(outcome, Outcome::Rejected);
        assert!(r.notices().iter().any(|n| n.starts_with("Usage:")));
    }
}
