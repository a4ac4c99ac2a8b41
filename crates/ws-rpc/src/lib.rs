//! JSON-RPC 2.0 over WebSocket, multiplexed, for many named endpoints.
//!
//! A [`ConnectionPool`] holds the configuration of every endpoint and opens
//! one persistent socket per endpoint the first time it is used. Calls on
//! the same socket are correlated by id, so any number of them may be in
//! flight at once and their replies may arrive in any order.
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use ws_rpc::{ConnectionPool, EndpointConfig};
//!
//! async fn example() -> ws_rpc::Result<()> {
//!     let alpha = EndpointConfig::parse("ws://127.0.0.1:25585", "secret-token")
//!         .expect("valid url");
//!     let pool = ConnectionPool::new([("alpha", alpha)]);
//!
//!     let players = pool.request("alpha", "minecraft:players", None).await?;
//!     println!("{players}");
//!
//!     pool.request("alpha", "minecraft:server/save", Some(json!([true])))
//!         .await?;
//!
//!     pool.disconnect(None).await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod connection;
pub mod error;
pub mod pending;
pub mod pool;
pub mod protocol;
pub mod transport;

// Re-export commonly used types
pub use config::{ClientConfig, Credential, DEFAULT_CALL_TIMEOUT, EndpointConfig};
pub use connection::{Connection, ConnectionState};
pub use error::{CodecError, Error, Result, TransportError};
pub use pool::{ConnectionPool, PoolBuilder};
pub use transport::{Connector, MemoryAcceptor, MemoryConnector, MemoryPeer, WebSocketConnector};

// Re-export dependencies that are part of our public API
pub use serde_json::Value;
pub use url::Url;
