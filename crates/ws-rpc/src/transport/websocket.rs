//! WebSocket connector built on tokio-tungstenite.

use super::{Connector, FrameSink, FrameStream};
use crate::config::EndpointConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt, future};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, warn};

/// Connects to endpoints over WebSocket with an `Authorization: Bearer` header.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a new WebSocket connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(
        &self,
        endpoint: &EndpointConfig,
    ) -> Result<(FrameSink, FrameStream), TransportError> {
        let address = endpoint.address().to_string();

        let mut request =
            address
                .as_str()
                .into_client_request()
                .map_err(|e| TransportError::Handshake {
                    address: address.clone(),
                    reason: e.to_string(),
                })?;

        let mut bearer =
            HeaderValue::from_str(&format!("Bearer {}", endpoint.credential().expose()))
                .map_err(|_| TransportError::InvalidCredential)?;
        bearer.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, bearer);

        debug!("Connecting to WebSocket at {}", address);

        let (ws_stream, _) = connect_async(request).await.map_err(|e| match e {
            WsError::Http(response)
                if response.status() == StatusCode::UNAUTHORIZED
                    || response.status() == StatusCode::FORBIDDEN =>
            {
                TransportError::Unauthorized {
                    address: address.clone(),
                }
            }
            other => TransportError::Handshake {
                address: address.clone(),
                reason: other.to_string(),
            },
        })?;

        let (sink, stream) = ws_stream.split();

        let sink = sink
            .sink_map_err(|e| TransportError::Send(e.to_string()))
            .with(|text: String| future::ready(Ok::<_, TransportError>(Message::text(text))));

        let stream = stream.filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => Some(Ok(text)),
                    Err(e) => {
                        warn!("Discarding non UTF-8 binary frame: {}", e);
                        None
                    }
                },
                Ok(Message::Close(frame)) => {
                    debug!("Peer sent close frame: {:?}", frame);
                    None
                }
                // Ping/pong are answered by tungstenite itself.
                Ok(_) => None,
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {
                    Some(Err(TransportError::Closed))
                }
                Err(e) => Some(Err(TransportError::Receive(e.to_string()))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}
