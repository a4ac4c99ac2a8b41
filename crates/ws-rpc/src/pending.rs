//! Table of calls awaiting a reply.

use crate::error::{Error, Result, TransportError};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Type alias for the one-shot slot a reply is delivered through.
pub type ResponseSender = oneshot::Sender<Result<Value>>;

/// Outstanding calls on one connection, keyed by correlation id.
///
/// Every slot is fulfilled at most once: whichever of [`complete`],
/// [`remove`] or [`fail_all`] takes the entry out of the table owns it.
///
/// [`complete`]: PendingCalls::complete
/// [`remove`]: PendingCalls::remove
/// [`fail_all`]: PendingCalls::fail_all
#[derive(Debug, Default)]
pub struct PendingCalls {
    calls: HashMap<u64, ResponseSender>,
}

impl PendingCalls {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call and return the receiving half of its slot.
    pub fn register(&mut self, id: u64) -> oneshot::Receiver<Result<Value>> {
        let (tx, rx) = oneshot::channel();
        self.calls.insert(id, tx);
        rx
    }

    /// Fulfil the slot for `id`.
    ///
    /// Returns `false` when no call with that id is outstanding; the
    /// outcome is dropped in that case.
    pub fn complete(&mut self, id: u64, outcome: Result<Value>) -> bool {
        match self.calls.remove(&id) {
            // The receiver may already be gone if the caller was cancelled.
            Some(sender) => {
                let _ = sender.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Forget a call without fulfilling it.
    pub fn remove(&mut self, id: u64) -> bool {
        self.calls.remove(&id).is_some()
    }

    /// Fail every outstanding call because the connection closed.
    ///
    /// Returns how many calls were failed.
    pub fn fail_all(&mut self) -> usize {
        let count = self.calls.len();
        for (_, sender) in self.calls.drain() {
            let _ = sender.send(Err(Error::Transport(TransportError::Closed)));
        }
        count
    }

    #[cfg(test)]
    fn contains(&self, id: u64) -> bool {
        self.calls.contains_key(&id)
    }

    /// Number of outstanding calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Whether no calls are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
