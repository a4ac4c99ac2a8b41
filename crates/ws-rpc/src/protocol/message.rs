//! JSON-RPC 2.0 envelopes.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Protocol version carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Correlation identifier as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Integer identifier; this client only issues these.
    Number(u64),
    /// String identifier.
    String(String),
}

impl RequestId {
    /// Numeric form of the identifier, if it has one.
    ///
    /// Strings holding a decimal integer map to the same number, so a peer
    /// that echoes ids as strings still correlates.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(id) => Some(*id),
            Self::String(id) => id.parse().ok(),
        }
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(id) => write!(f, "{id}"),
            Self::String(id) => write!(f, "{id:?}"),
        }
    }
}

/// Outbound call envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Request<'a> {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Remote method name.
    pub method: &'a str,
    /// Call parameters; omitted from the wire when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<&'a Value>,
    /// Correlation identifier.
    pub id: RequestId,
}

impl<'a> Request<'a> {
    /// Build a request envelope.
    #[must_use]
    pub fn new(id: u64, method: &'a str, params: Option<&'a Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
            id: RequestId::Number(id),
        }
    }
}

/// Structured failure returned by an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// Error code for categorization.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Raw inbound envelope, before the result/error exclusivity check.
#[derive(Debug, Deserialize)]
pub(crate) struct RawResponse {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<RequestId>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorObject>,
}

/// Treat an explicit `null` as a present value rather than an absent one.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// A decoded reply to one of our calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// The id of the call this answers.
    pub id: RequestId,
    /// Either the call's result or the endpoint's error.
    pub outcome: std::result::Result<Value, ErrorObject>,
}

/// Anything the endpoint may push down the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A reply correlated by id.
    Response(Response),
    /// A server-initiated notification; carries no id.
    Notification {
        /// Notification method name.
        method: String,
        /// Notification payload.
        params: Option<Value>,
    },
}
