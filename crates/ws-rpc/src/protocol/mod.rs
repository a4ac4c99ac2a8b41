//! Protocol layer.
//!
//! JSON-RPC 2.0 envelope types and the text codec that turns them into
//! WebSocket frames and back.

pub mod codec;
pub mod message;

pub use message::{ErrorObject, Inbound, Request, RequestId, Response};
