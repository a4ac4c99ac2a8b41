//! In-memory connector for testing
//!
//! Sockets are a pair of unbounded channels. Each successful handshake
//! hands the endpoint side of the pair to a [`MemoryAcceptor`], which plays
//! the remote server.

use super::{Connector, FrameSink, FrameStream};
use crate::config::EndpointConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use futures::channel::mpsc as frames;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

/// Connector whose sockets terminate at a [`MemoryAcceptor`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    incoming_tx: mpsc::UnboundedSender<MemoryPeer>,
    required_credential: Option<String>,
    attempts: Arc<AtomicUsize>,
}

impl MemoryConnector {
    /// Create a connector and the acceptor that receives its sockets.
    #[must_use]
    pub fn new() -> (Self, MemoryAcceptor) {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

        let connector = Self {
            incoming_tx,
            required_credential: None,
            attempts: Arc::new(AtomicUsize::new(0)),
        };

        (connector, MemoryAcceptor { incoming_rx })
    }

    /// Reject handshakes that do not present `token`.
    #[must_use]
    pub fn with_credential(mut self, token: impl Into<String>) -> Self {
        self.required_credential = Some(token.into());
        self
    }

    /// Number of handshakes attempted so far, successful or not.
    #[must_use]
    pub fn connect_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        endpoint: &EndpointConfig,
    ) -> Result<(FrameSink, FrameStream), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(required) = &self.required_credential {
            if endpoint.credential().expose() != required {
                return Err(TransportError::Unauthorized {
                    address: endpoint.address().to_string(),
                });
            }
        }

        let (client_to_server_tx, client_to_server_rx) = frames::unbounded();
        let (server_to_client_tx, server_to_client_rx) = frames::unbounded();

        let peer = MemoryPeer {
            endpoint: endpoint.address().clone(),
            sender: server_to_client_tx,
            receiver: client_to_server_rx,
        };

        self.incoming_tx
            .send(peer)
            .map_err(|_| TransportError::Handshake {
                address: endpoint.address().to_string(),
                reason: "acceptor closed".to_string(),
            })?;

        debug!("Memory connection established to {}", endpoint.address());

        let sink = client_to_server_tx.sink_map_err(|_| TransportError::Closed);
        let stream = server_to_client_rx.map(Ok::<_, TransportError>);

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

/// Receives the endpoint side of every socket a [`MemoryConnector`] opens.
#[derive(Debug)]
pub struct MemoryAcceptor {
    incoming_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryAcceptor {
    /// Wait for the next socket. Returns `None` once every connector is gone.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.incoming_rx.recv().await
    }
}

/// The endpoint side of an in-memory socket.
///
/// Dropping the peer closes the socket from the endpoint's side.
#[derive(Debug)]
pub struct MemoryPeer {
    endpoint: Url,
    sender: frames::UnboundedSender<String>,
    receiver: frames::UnboundedReceiver<String>,
}

impl MemoryPeer {
    /// Address the client connected to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Next raw frame written by the client, or `None` once it closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.next().await
    }

    /// Next frame written by the client, parsed as JSON.
    ///
    /// Frames that are not JSON are skipped.
    pub async fn recv_request(&mut self) -> Option<Value> {
        loop {
            let frame = self.recv().await?;
            if let Ok(value) = serde_json::from_str(&frame) {
                return Some(value);
            }
        }
    }

    /// Push a raw frame to the client. Returns `false` if the client is gone.
    pub fn send(&self, frame: impl Into<String>) -> bool {
        self.sender.unbounded_send(frame.into()).is_ok()
    }

    /// Answer call `id` with `result`.
    pub fn reply(&self, id: &Value, result: Value) -> bool {
        self.send(json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string())
    }

    /// Answer call `id` with a JSON-RPC error.
    pub fn reply_error(&self, id: &Value, code: i64, message: &str) -> bool {
        self.send(
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": code, "message": message},
            })
            .to_string(),
        )
    }

    /// Close the socket from the endpoint's side.
    pub fn close(self) {
        self.sender.close_channel();
    }
}
