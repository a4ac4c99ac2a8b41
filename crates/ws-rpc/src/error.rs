//! Error types for the RPC client.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for RPC operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for RPC operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket, handshake or closure failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The endpoint rejected the call.
    #[error("Remote error {code}: {message}")]
    Remote {
        /// JSON-RPC error code.
        code: i64,
        /// Human-readable error message.
        message: String,
        /// Optional additional details supplied by the endpoint.
        data: Option<serde_json::Value>,
    },

    /// No reply arrived before the call deadline.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The caller named an endpoint that is not configured.
    #[error("Endpoint '{name}' not found in configuration. Available endpoints: {}", known.join(", "))]
    UnknownEndpoint {
        /// The requested endpoint name.
        name: String,
        /// Names of all configured endpoints, in configuration order.
        known: Vec<String>,
    },

    /// Codec errors during serialization/deserialization.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

impl Error {
    /// Whether the error came from the transport rather than the call itself.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Transport-level errors.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The WebSocket handshake failed.
    #[error("Failed to connect to {address}: {reason}")]
    Handshake {
        /// The address we tried to connect to.
        address: String,
        /// Why the handshake failed.
        reason: String,
    },

    /// The endpoint refused the bearer credential.
    #[error("Credential rejected by {address}")]
    Unauthorized {
        /// The address that rejected the credential.
        address: String,
    },

    /// The handshake did not complete in time.
    #[error("Handshake with {address} timed out after {timeout:?}")]
    HandshakeTimeout {
        /// The address we tried to connect to.
        address: String,
        /// The configured connect timeout.
        timeout: Duration,
    },

    /// The credential cannot be carried in an HTTP header.
    #[error("Credential is not a valid header value")]
    InvalidCredential,

    /// Connection closed, either locally or by the peer.
    #[error("Connection closed")]
    Closed,

    /// Writing a frame to the socket failed.
    #[error("Failed to send frame: {0}")]
    Send(String),

    /// Reading from the socket failed.
    #[error("Failed to receive frame: {0}")]
    Receive(String),
}

/// Codec-related errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Serialization failed.
    #[error("Failed to serialize: {0}")]
    SerializationFailed(String),

    /// Deserialization failed.
    #[error("Failed to deserialize: {0}")]
    DeserializationFailed(String),

    /// The frame parsed as JSON but is not a valid response envelope.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_endpoint_lists_known_names() {
        let err = Error::UnknownEndpoint {
            name: "missing".to_string(),
            known: vec!["alpha".to_string(), "beta".to_string()],
        };

        assert_eq!(
            err.to_string(),
            "Endpoint 'missing' not found in configuration. Available endpoints: alpha, beta"
        );
    }

    #[test]
    fn test_remote_error_display() {
        let err = Error::Remote {
            code: -32601,
            message: "Method not found".to_string(),
            data: None,
        };

        assert_eq!(err.to_string(), "Remote error -32601: Method not found");
        assert!(!err.is_transport());
    }

    #[test]
    fn test_transport_conversion() {
        let err: Error = TransportError::Closed.into();
        assert!(err.is_transport());
        assert_eq!(err.to_string(), "Transport error: Connection closed");
    }
}
