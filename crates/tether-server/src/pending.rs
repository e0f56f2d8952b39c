//! Correlation table for in-flight requests.
//!
//! One entry per correlation id, holding the waiter for the eventual reply.
//! Whoever removes the entry (the inbound dispatcher on a matching reply, or
//! the submitter on deadline expiry) owns the terminal resolution, so every
//! request resolves exactly once and late replies are no-ops here.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use tether_core::errors::RelayError;
use tether_core::ids::CorrelationId;
use tether_core::protocol::ReplyMessage;

/// Table of requests awaiting a matching reply.
pub struct PendingTable {
    entries: Mutex<HashMap<CorrelationId, oneshot::Sender<ReplyMessage>>>,
}

impl PendingTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register a waiter for `id`.
    ///
    /// A submit reusing an id that is still pending is rejected rather than
    /// overwriting the first waiter, which would leave it unresolvable.
    pub fn insert(
        &self,
        id: CorrelationId,
        sender: oneshot::Sender<ReplyMessage>,
    ) -> Result<(), RelayError> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&id) {
            return Err(RelayError::DuplicateCorrelation { id });
        }
        let _ = entries.insert(id, sender);
        Ok(())
    }

    /// Resolve the waiter for `reply.id`, if one exists.
    ///
    /// Returns `true` when a pending entry was matched and completed. A reply
    /// whose id matches nothing changes no state.
    pub fn resolve(&self, reply: ReplyMessage) -> bool {
        let waiter = self.entries.lock().remove(&reply.id);
        match waiter {
            // The receiver only disappears when the submitter gave up right
            // at the deadline; either way the entry is gone.
            Some(sender) => sender.send(reply).is_ok(),
            None => false,
        }
    }

    /// Remove the entry for `id` without resolving it (timeout path).
    ///
    /// Returns `false` when the entry was already gone, meaning the reply
    /// path won the race.
    pub fn remove(&self, id: &CorrelationId) -> bool {
        self.entries.lock().remove(id).is_some()
    }

    /// Number of in-flight requests.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no request is in flight.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}
