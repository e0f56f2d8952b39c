//! Observer stream registry and fan-out.
//!
//! Observers are long-lived outbound sinks (SSE responses) mirroring every
//! raw executor-originated message for an identity. Delivery is best-effort:
//! a sink that fails to accept a write is dropped from the registry, not
//! retried, and there is no buffering or replay for late subscribers.

use std::sync::Arc;

use dashmap::DashMap;
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::metrics::SSE_OBSERVER_DROPS_TOTAL;
use tether_core::ids::{Identity, ObserverId};

struct ObserverSink {
    id: ObserverId,
    tx: mpsc::Sender<Arc<String>>,
}

/// Registry of live observer sinks, grouped by identity.
pub struct ObserverRegistry {
    observers: DashMap<Identity, Vec<ObserverSink>>,
    queue_depth: usize,
}

impl ObserverRegistry {
    /// Create an empty registry.
    pub fn new(queue_depth: usize) -> Self {
        Self {
            observers: DashMap::new(),
            queue_depth,
        }
    }

    /// Register a new observer for `identity`, returning its id and the
    /// receiver feeding the client-facing stream.
    pub fn subscribe(&self, identity: Identity) -> (ObserverId, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(self.queue_depth);
        let id = ObserverId::new();
        self.observers
            .entry(identity)
            .or_default()
            .push(ObserverSink {
                id: id.clone(),
                tx,
            });
        (id, rx)
    }

    /// Remove an observer. Idempotent.
    pub fn unsubscribe(&self, identity: &Identity, id: &ObserverId) {
        let emptied = if let Some(mut entry) = self.observers.get_mut(identity) {
            entry.retain(|s| s.id != *id);
            entry.is_empty()
        } else {
            false
        };
        if emptied {
            let _ = self.observers.remove_if(identity, |_, v| v.is_empty());
        }
        debug!(observer_id = %id, identity = %identity, "observer unsubscribed");
    }

    /// Deliver a raw message to every currently-registered sink for
    /// `identity`. Sinks that refuse the write (full or closed) are removed.
    pub fn publish(&self, identity: &Identity, raw: &str) {
        let Some(mut entry) = self.observers.get_mut(identity) else {
            return;
        };
        let message = Arc::new(raw.to_owned());
        let before = entry.len();
        entry.retain(|sink| {
            let delivered = sink.tx.try_send(Arc::clone(&message)).is_ok();
            if !delivered {
                counter!(SSE_OBSERVER_DROPS_TOTAL).increment(1);
                warn!(observer_id = %sink.id, identity = %identity, "observer sink refused write, dropping it");
            }
            delivered
        });
        let emptied = entry.is_empty();
        debug!(
            identity = %identity,
            recipients = entry.len(),
            dropped = before - entry.len(),
            "published executor message"
        );
        drop(entry);
        if emptied {
            let _ = self.observers.remove_if(identity, |_, v| v.is_empty());
        }
    }

    /// Total registered observers.
    pub fn count(&self) -> usize {
        self.observers.iter().map(|e| e.value().len()).sum()
    }

    /// Observers registered for one identity.
    pub fn count_for(&self, identity: &Identity) -> usize {
        self.observers.get(identity).map_or(0, |v| v.len())
    }
}
