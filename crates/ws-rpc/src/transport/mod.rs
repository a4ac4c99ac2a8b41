//! Transport layer.
//!
//! A [`Connector`] performs the handshake against one endpoint and hands
//! back the two halves of the socket as text frame sink and stream. The
//! connection layer owns both halves from then on: one reader task drains
//! the stream and writers take turns on the sink.

pub mod memory;
pub mod websocket;

use crate::config::EndpointConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use futures::{Sink, Stream};
use std::fmt::Debug;
use std::pin::Pin;

pub use memory::{MemoryAcceptor, MemoryConnector, MemoryPeer};
pub use websocket::WebSocketConnector;

/// Outbound half of a socket.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Inbound half of a socket. Ends when the peer closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Establishes authenticated sockets to endpoints.
#[async_trait]
pub trait Connector: Debug + Send + Sync + 'static {
    /// Open a socket to `endpoint`, presenting its credential.
    async fn connect(
        &self,
        endpoint: &EndpointConfig,
    ) -> Result<(FrameSink, FrameStream), TransportError>;
}
