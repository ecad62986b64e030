//! One-shot WebSocket relay to the automation endpoint.
//!
//! Each relay opens a fresh connection, writes exactly one text frame, and
//! closes. No reuse, no retry, no buffering, and no response is awaited.
//! Every step (connect, send, close) is bounded by a timeout so a hung
//! endpoint cannot stall a message's pipeline indefinitely.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::SinkExt;
use thiserror::Error;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

/// Default bound on each relay connect/send/close step.
pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(5);

/// A failed relay attempt, carrying the underlying transport cause.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Could not open a connection to the endpoint.
    #[error("could not connect to relay endpoint: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),

    /// The connection opened but the payload frame could not be written.
    #[error("could not send payload frame: {0}")]
    Send(#[source] tokio_tungstenite::tungstenite::Error),

    /// A connect or send step exceeded the configured bound.
    #[error("relay timed out after {0:?}")]
    Timeout(Duration),
}

/// Sink for resolved payloads. Implemented by [`RelayClient`] for the real
/// endpoint and by recording fakes in dispatcher tests.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Deliver one payload as a single text frame. Best-effort: an `Ok`
    /// means the frame was written, not that the endpoint acted on it.
    async fn relay(&self, payload: &str) -> Result<(), RelayError>;
}

/// Relay client holding the configured endpoint address and timeout.
///
/// Deliberately connectionless between calls: concurrent dispatches each
/// run their own connection, so there is no shared socket state.
#[derive(Debug, Clone)]
pub struct RelayClient {
    endpoint: String,
    timeout: Duration,
}

impl RelayClient {
    /// Create a client for `endpoint` with the default timeout.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_timeout(endpoint, DEFAULT_RELAY_TIMEOUT)
    }

    /// Create a client with an explicit per-step timeout.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
        }
    }

    /// The configured endpoint address.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Relay for RelayClient {
    async fn relay(&self, payload: &str) -> Result<(), RelayError> {
        debug!(endpoint = %self.endpoint, "opening relay connection");

        let (mut stream, _) = timeout(
            self.timeout,
            tokio_tungstenite::connect_async(self.endpoint.as_str()),
        )
        .await
        .map_err(|_| RelayError::Timeout(self.timeout))?
        .map_err(RelayError::Connect)?;

        let sent = match timeout(
            self.timeout,
            stream.send(Message::Text(payload.to_string())),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RelayError::Send(e)),
            Err(_) => Err(RelayError::Timeout(self.timeout)),
        };

        // Close on every exit path. A close failure after a successful send
        // is only logged: the frame is already on the wire and no response
        // is awaited.
        match timeout(self.timeout, stream.close(None)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("relay close failed: {e}"),
            Err(_) => debug!("relay close timed out"),
        }

        sent?;
        debug!(bytes = payload.len(), "payload relayed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::StreamExt;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Bind a loopback WebSocket server that forwards every received text
    /// frame into the returned channel.
    async fn spawn_sink_server() -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                    while let Some(Ok(frame)) = ws.next().await {
                        if let Message::Text(text) = frame {
                            tx.send(text).unwrap();
                        }
                    }
                });
            }
        });

        (format!("ws://{addr}"), rx)
    }

    #[tokio::test]
    async fn relays_exactly_one_text_frame() {
        let (endpoint, mut rx) = spawn_sink_server().await;
        let client = RelayClient::new(endpoint);

        client.relay("jump 3").await.unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("jump 3"));
        // The connection was closed after one frame; nothing else arrives.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn each_relay_uses_a_fresh_connection() {
        let (endpoint, mut rx) = spawn_sink_server().await;
        let client = RelayClient::new(endpoint);

        client.relay("wave").await.unwrap();
        client.relay("bow").await.unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("wave"));
        assert_eq!(rx.recv().await.as_deref(), Some("bow"));
    }

    #[tokio::test]
    async fn connection_refusal_maps_to_relay_error() {
        // Nothing listens on the discard port.
        let client = RelayClient::new("ws://127.0.0.1:9");
        let err = client.relay("wave").await.unwrap_err();
        assert!(matches!(err, RelayError::Connect(_)));
    }

    #[tokio::test]
    async fn malformed_endpoint_maps_to_relay_error() {
        let client = RelayClient::new("not a websocket url");
        assert!(client.relay("wave").await.is_err());
    }
}
