//! A single multiplexed connection to one endpoint.
//!
//! Calls share one socket. Each call gets a fresh correlation id and a slot
//! in the [`PendingCalls`] table; a single reader task matches replies to
//! slots as they arrive, in whatever order the endpoint answers.

use crate::config::{ClientConfig, EndpointConfig};
use crate::error::{Error, Result, TransportError};
use crate::pending::PendingCalls;
use crate::protocol::{Inbound, Request, codec};
use crate::transport::{Connector, FrameSink, FrameStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// Lifecycle of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket. The next call opens one.
    Closed,
    /// A handshake is in flight.
    Connecting,
    /// The socket is up and the reader task is running.
    Open,
}

/// State shared between callers and the reader task.
///
/// Never held across an await point.
struct Inner {
    state: ConnectionState,
    writer: Option<Arc<AsyncMutex<FrameSink>>>,
    reader: Option<JoinHandle<()>>,
    pending: PendingCalls,
    next_id: u64,
    /// Bumped on every open and close so a stale reader cannot tear down a
    /// newer session.
    generation: u64,
    /// Handshakes finished so far, successful or not.
    handshakes: u64,
    /// Outcome of the last finished handshake, if it failed.
    last_failure: Option<TransportError>,
    /// Evicted from its pool; never reopens.
    retired: bool,
}

impl Inner {
    /// Move to `Closed` and fail every outstanding call.
    fn shut(&mut self) -> (Option<Arc<AsyncMutex<FrameSink>>>, Option<JoinHandle<()>>, usize) {
        self.generation += 1;
        self.state = ConnectionState::Closed;
        (self.writer.take(), self.reader.take(), self.pending.fail_all())
    }
}

/// One persistent socket to one endpoint.
pub struct Connection {
    name: String,
    endpoint: EndpointConfig,
    connector: Arc<dyn Connector>,
    config: ClientConfig,
    inner: Arc<Mutex<Inner>>,
    connect_lock: AsyncMutex<()>,
}

impl Connection {
    /// Create an unopened connection. Nothing touches the network until the
    /// first [`call`](Self::call) or [`connect`](Self::connect).
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        endpoint: EndpointConfig,
        connector: Arc<dyn Connector>,
        config: ClientConfig,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint,
            connector,
            config,
            inner: Arc::new(Mutex::new(Inner {
                state: ConnectionState::Closed,
                writer: None,
                reader: None,
                pending: PendingCalls::new(),
                next_id: 0,
                generation: 0,
                handshakes: 0,
                last_failure: None,
                retired: false,
            })),
            connect_lock: AsyncMutex::new(()),
        }
    }

    /// Name of the endpoint this connection serves.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Number of calls awaiting a reply.
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Open the socket if it is not open yet.
    ///
    /// Concurrent callers share one handshake: callers that queue behind a
    /// handshake in flight get its outcome, success or failure. Only a call
    /// that starts after a handshake has finished tries again.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the handshake fails, times out, or the
    /// connection is closed while the handshake is in flight, and
    /// [`TransportError::Closed`] once the connection has been evicted from
    /// its pool.
    #[instrument(skip(self), fields(endpoint = %self.name))]
    pub async fn connect(&self) -> Result<()> {
        let seen = {
            let inner = self.inner.lock();
            if inner.retired {
                return Err(TransportError::Closed.into());
            }
            if inner.state == ConnectionState::Open {
                return Ok(());
            }
            inner.handshakes
        };

        let _connecting = self.connect_lock.lock().await;

        {
            let mut inner = self.inner.lock();
            if inner.retired {
                return Err(TransportError::Closed.into());
            }
            if inner.state == ConnectionState::Open {
                return Ok(());
            }
            if inner.handshakes != seen {
                if let Some(e) = &inner.last_failure {
                    debug!("Sharing failed handshake with {}", self.endpoint.address());
                    return Err(e.clone().into());
                }
            }
            inner.state = ConnectionState::Connecting;
        }
        let _reset = ResetConnecting(&self.inner);

        let address = self.endpoint.address();
        debug!("Connecting to {}", address);

        let handshake = timeout(
            self.config.connect_timeout,
            self.connector.connect(&self.endpoint),
        )
        .await
        .map_err(|_| TransportError::HandshakeTimeout {
            address: address.to_string(),
            timeout: self.config.connect_timeout,
        })
        .and_then(|handshake| handshake);

        let mut inner = self.inner.lock();
        inner.handshakes += 1;

        let (sink, stream) = match handshake {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Failed to connect to {}: {}", address, e);
                inner.last_failure = Some(e.clone());
                return Err(e.into());
            }
        };

        if inner.state != ConnectionState::Connecting {
            debug!("Connection closed during handshake with {}", address);
            inner.last_failure = Some(TransportError::Closed);
            return Err(TransportError::Closed.into());
        }

        inner.last_failure = None;
        inner.generation += 1;
        inner.writer = Some(Arc::new(AsyncMutex::new(sink)));
        inner.reader = Some(tokio::spawn(read_loop(
            Arc::clone(&self.inner),
            stream,
            inner.generation,
            self.name.clone(),
        )));
        inner.state = ConnectionState::Open;

        info!("Connected to {}", address);

        Ok(())
    }

    /// Issue a call and wait for its reply.
    ///
    /// Opens the socket first if needed. The deadline covers the write and
    /// the wait for the reply; when it elapses the call is forgotten and a
    /// late reply is dropped by the reader.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] if the socket cannot be opened, the write
    ///   fails, or the connection closes before the reply arrives.
    /// - [`Error::Remote`] if the endpoint answers with an error.
    /// - [`Error::Timeout`] if no reply arrives before the deadline.
    #[instrument(skip(self, params), fields(endpoint = %self.name))]
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.connect().await?;

        let (id, writer, reply) = {
            let mut inner = self.inner.lock();
            let Some(writer) = inner.writer.clone() else {
                return Err(TransportError::Closed.into());
            };
            inner.next_id += 1;
            let id = inner.next_id;
            (id, writer, inner.pending.register(id))
        };
        let _pending = ForgetOnDrop {
            inner: &self.inner,
            id,
        };

        let frame = codec::encode(&Request::new(id, method, params.as_ref()))?;

        debug!("Sending request {} ({})", id, method);

        let deadline = self.config.call_timeout;
        timeout(deadline, exchange(&writer, frame, reply))
            .await
            .unwrap_or_else(|_| {
                warn!("Request {} ({}) timed out after {:?}", id, method, deadline);
                Err(Error::Timeout(deadline))
            })
    }

    /// Close the socket and fail every outstanding call.
    ///
    /// Idempotent. A later call opens a fresh socket.
    #[instrument(skip(self), fields(endpoint = %self.name))]
    pub async fn close(&self) {
        let (writer, reader, failed) = self.inner.lock().shut();

        if let Some(reader) = reader {
            reader.abort();
        }

        if let Some(writer) = writer {
            let closed = timeout(self.config.close_timeout, async {
                writer.lock().await.close().await
            })
            .await;

            if let Ok(Err(e)) = closed {
                debug!("Error while closing socket: {}", e);
            }

            info!("Connection closed ({} pending calls failed)", failed);
        }
    }

    /// Close for good. Later calls fail with [`TransportError::Closed`]
    /// instead of reopening the socket.
    pub(crate) async fn retire(&self) {
        self.inner.lock().retired = true;
        self.close().await;
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("address", &self.endpoint.address().as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(reader) = self.inner.lock().reader.take() {
            reader.abort();
        }
    }
}

/// Write one frame, then wait for its reply slot.
async fn exchange(
    writer: &AsyncMutex<FrameSink>,
    frame: String,
    reply: oneshot::Receiver<Result<Value>>,
) -> Result<Value> {
    writer.lock().await.send(frame).await?;

    reply
        .await
        .unwrap_or(Err(Error::Transport(TransportError::Closed)))
}

/// Removes a call from the table when its caller stops waiting.
struct ForgetOnDrop<'a> {
    inner: &'a Mutex<Inner>,
    id: u64,
}

impl Drop for ForgetOnDrop<'_> {
    fn drop(&mut self) {
        self.inner.lock().pending.remove(self.id);
    }
}

/// Puts an abandoned handshake back to `Closed`.
struct ResetConnecting<'a>(&'a Mutex<Inner>);

impl Drop for ResetConnecting<'_> {
    fn drop(&mut self) {
        let mut inner = self.0.lock();
        if inner.state == ConnectionState::Connecting {
            inner.state = ConnectionState::Closed;
        }
    }
}

/// Drain inbound frames until the socket closes.
async fn read_loop(
    inner: Arc<Mutex<Inner>>,
    mut stream: FrameStream,
    generation: u64,
    name: String,
) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(text) => handle_frame(&inner, &text),
            Err(e) => {
                warn!("Stream error on {}: {}", name, e);
                break;
            }
        }
    }

    let failed = {
        let mut inner = inner.lock();
        if inner.generation != generation {
            return;
        }
        let (_writer, _reader, failed) = inner.shut();
        failed
    };

    info!(
        "Connection to {} closed by peer ({} pending calls failed)",
        name, failed
    );
}

fn handle_frame(inner: &Mutex<Inner>, text: &str) {
    match codec::decode(text) {
        Ok(Inbound::Response(response)) => {
            let Some(id) = response.id.as_u64() else {
                debug!("Discarding reply with foreign id {}", response.id);
                return;
            };

            let outcome = response.outcome.map_err(|error| Error::Remote {
                code: error.code,
                message: error.message,
                data: error.data,
            });

            if !inner.lock().pending.complete(id, outcome) {
                debug!("Discarding reply for unknown request {}", id);
            }
        }
        Ok(Inbound::Notification { method, .. }) => {
            debug!("Ignoring notification {}", method);
        }
        Err(e) => {
            warn!("Discarding malformed frame: {}", e);
        }
    }
}
