//! Named endpoints and their lazily opened connections.

use crate::config::{ClientConfig, EndpointConfig};
use crate::connection::Connection;
use crate::error::{CodecError, Error, Result};
use crate::transport::{Connector, WebSocketConnector};
use dashmap::DashMap;
use futures::future::join_all;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Builder for creating connection pools.
#[derive(Debug, Default)]
pub struct PoolBuilder {
    endpoints: IndexMap<String, EndpointConfig>,
    connector: Option<Arc<dyn Connector>>,
    config: ClientConfig,
}

impl PoolBuilder {
    /// Create a new pool builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an endpoint. A later entry with the same name replaces the
    /// earlier one but keeps its position.
    #[must_use]
    pub fn endpoint(mut self, name: impl Into<String>, endpoint: EndpointConfig) -> Self {
        self.endpoints.insert(name.into(), endpoint);
        self
    }

    /// Add several endpoints, in iteration order.
    #[must_use]
    pub fn endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = (S, EndpointConfig)>,
        S: Into<String>,
    {
        self.endpoints
            .extend(endpoints.into_iter().map(|(name, e)| (name.into(), e)));
        self
    }

    /// Use a custom connector instead of WebSocket.
    #[must_use]
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Set the per-call deadline.
    #[must_use]
    pub const fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = timeout;
        self
    }

    /// Set the handshake deadline.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Replace all timeouts at once.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the pool. No connection is opened here.
    #[must_use]
    pub fn build(self) -> ConnectionPool {
        ConnectionPool {
            endpoints: self.endpoints,
            connections: DashMap::new(),
            connector: self
                .connector
                .unwrap_or_else(|| Arc::new(WebSocketConnector::new()) as Arc<dyn Connector>),
            config: self.config,
        }
    }
}

/// Zero or one [`Connection`] per configured endpoint, opened on first use.
#[derive(Debug)]
pub struct ConnectionPool {
    endpoints: IndexMap<String, EndpointConfig>,
    connections: DashMap<String, Arc<Connection>>,
    connector: Arc<dyn Connector>,
    config: ClientConfig,
}

impl ConnectionPool {
    /// Create a pool over WebSocket with default timeouts.
    #[must_use]
    pub fn new<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = (S, EndpointConfig)>,
        S: Into<String>,
    {
        PoolBuilder::new().endpoints(endpoints).build()
    }

    /// Create a new pool builder.
    #[must_use]
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Connection for `name`, created unopened on first access.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEndpoint`] if `name` is not configured.
    pub fn route(&self, name: &str) -> Result<Arc<Connection>> {
        let Some(endpoint) = self.endpoints.get(name) else {
            return Err(Error::UnknownEndpoint {
                name: name.to_string(),
                known: self.available_endpoints(),
            });
        };

        if let Some(conn) = self.connections.get(name) {
            return Ok(Arc::clone(conn.value()));
        }

        let conn = self
            .connections
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("Creating connection for {}", name);
                Arc::new(Connection::new(
                    name,
                    endpoint.clone(),
                    Arc::clone(&self.connector),
                    self.config.clone(),
                ))
            });

        Ok(Arc::clone(conn.value()))
    }

    /// Call `method` on endpoint `name`.
    ///
    /// # Errors
    ///
    /// Any error from [`route`](Self::route) or [`Connection::call`].
    pub async fn request(&self, name: &str, method: &str, params: Option<Value>) -> Result<Value> {
        self.route(name)?.call(method, params).await
    }

    /// Call `method` on endpoint `name` and deserialize the result.
    ///
    /// # Errors
    ///
    /// Any error from [`request`](Self::request), or [`Error::Codec`] if the
    /// result does not fit `T`.
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        name: &str,
        method: &str,
        params: Option<Value>,
    ) -> Result<T> {
        let result = self.request(name, method, params).await?;
        serde_json::from_value(result)
            .map_err(|e| CodecError::DeserializationFailed(e.to_string()).into())
    }

    /// Close and evict the connection for `name`, or every connection when
    /// `name` is `None`. The next request recreates what was evicted; an
    /// evicted [`Connection`] still held elsewhere refuses to reopen.
    pub async fn disconnect(&self, name: Option<&str>) {
        let evicted: Vec<Arc<Connection>> = match name {
            Some(name) => self
                .connections
                .remove(name)
                .map(|(_, conn)| conn)
                .into_iter()
                .collect(),
            None => {
                let names: Vec<String> =
                    self.connections.iter().map(|e| e.key().clone()).collect();
                names
                    .iter()
                    .filter_map(|name| self.connections.remove(name).map(|(_, conn)| conn))
                    .collect()
            }
        };

        if evicted.is_empty() {
            return;
        }

        join_all(evicted.iter().map(|conn| conn.retire())).await;

        info!("Disconnected {} endpoint(s)", evicted.len());
    }

    /// Configured endpoint names, in configuration order.
    #[must_use]
    pub fn available_endpoints(&self) -> Vec<String> {
        self.endpoints.keys().cloned().collect()
    }

    /// Configuration for `name`, if it is configured.
    #[must_use]
    pub fn endpoint(&self, name: &str) -> Option<&EndpointConfig> {
        self.endpoints.get(name)
    }

    #[cfg(test)]
    fn is_routed(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }
}
