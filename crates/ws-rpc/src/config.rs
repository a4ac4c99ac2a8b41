//! Endpoint and client configuration.

use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Default deadline for a single call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default deadline for the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed for sending a close frame.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Opaque bearer token presented during the handshake.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wrap a bearer token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Where an endpoint lives and how to authenticate against it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointConfig {
    #[serde(alias = "url")]
    address: Url,
    #[serde(alias = "secret")]
    credential: Credential,
}

impl EndpointConfig {
    /// Create a new endpoint configuration.
    #[must_use]
    pub const fn new(address: Url, credential: Credential) -> Self {
        Self {
            address,
            credential,
        }
    }

    /// Parse `address` and build a configuration from it.
    ///
    /// # Errors
    ///
    /// Returns an error if `address` is not a valid URL.
    pub fn parse(address: &str, credential: impl Into<String>) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(address)?, Credential::new(credential)))
    }

    /// The endpoint URL.
    #[must_use]
    pub const fn address(&self) -> &Url {
        &self.address
    }

    /// The bearer credential.
    #[must_use]
    pub const fn credential(&self) -> &Credential {
        &self.credential
    }
}

/// Timeouts shared by every connection in a pool.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deadline for a single call, measured from registration.
    pub call_timeout: Duration,
    /// Deadline for the WebSocket handshake.
    pub connect_timeout: Duration,
    /// Time allowed for the close frame when tearing a connection down.
    pub close_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_is_redacted() {
        let endpoint = EndpointConfig::parse("ws://localhost:25585", "hunter2").unwrap();

        let debug = format!("{endpoint:?}");
        assert!(!debug.contains("hunter2"));
        assert_eq!(endpoint.credential().expose(), "hunter2");
    }

    #[test]
    fn test_deserialize_with_aliases() {
        let endpoint: EndpointConfig = serde_json::from_str(
            r#"{ "url": "ws://127.0.0.1:25585", "secret": "abc" }"#,
        )
        .unwrap();

        assert_eq!(endpoint.address().as_str(), "ws://127.0.0.1:25585/");
        assert_eq!(endpoint.credential().expose(), "abc");
    }

    #[test]
    fn test_endpoint_order_is_preserved() {
        let endpoints: indexmap::IndexMap<String, EndpointConfig> = serde_json::from_str(
            r#"{
                "zulu": { "address": "ws://zulu", "credential": "z" },
                "alpha": { "address": "ws://alpha", "credential": "a" }
            }"#,
        )
        .unwrap();

        let names: Vec<_> = endpoints.keys().cloned().collect();
        assert_eq!(names, ["zulu", "alpha"]);
    }

    #[test]
    fn test_invalid_address() {
        assert!(EndpointConfig::parse("not a url", "abc").is_err());
    }

    #[test]
    fn test_default_timeouts() {
        let config = ClientConfig::default();
        assert_eq!(config.call_timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }
}
