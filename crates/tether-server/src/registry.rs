//! Executor connection registry.
//!
//! Tracks live executor WebSocket connections grouped by identity. A
//! connection is owned here from registration (on connect, before any
//! handshake message) to removal (close/error), and may be routed to the
//! moment it is registered.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use tether_core::ids::{ExecutorId, Identity};

/// A registered executor connection.
pub struct ExecutorHandle {
    /// Unique connection id.
    pub id: ExecutorId,
    /// Identity this executor serves.
    pub identity: Identity,
    /// Device label from the connection parameters.
    pub device: String,
    /// Send channel to the connection's WebSocket write task.
    tx: mpsc::Sender<String>,
    /// Cleared when the socket closes.
    connected: AtomicBool,
    /// When this connection was registered.
    pub connected_at: Instant,
}

impl ExecutorHandle {
    fn new(identity: Identity, device: String, tx: mpsc::Sender<String>) -> Self {
        Self {
            id: ExecutorId::new(),
            identity,
            device,
            tx,
            connected: AtomicBool::new(true),
            connected_at: Instant::now(),
        }
    }

    /// Queue a serialized command for the write task.
    ///
    /// Returns `false` when the queue is full or the connection is gone.
    pub fn send(&self, message: String) -> bool {
        self.tx.try_send(message).is_ok()
    }

    /// Whether the socket is still up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Mark the socket as closed.
    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Relaxed);
    }
}

/// Registry of live executor connections, grouped by identity.
pub struct ExecutorRegistry {
    executors: DashMap<Identity, Vec<Arc<ExecutorHandle>>>,
    max_send_queue: usize,
}

impl ExecutorRegistry {
    /// Create an empty registry.
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            executors: DashMap::new(),
            max_send_queue,
        }
    }

    /// Register a new connection under `identity`, returning the handle and
    /// the receiver its write task drains.
    pub fn register(
        &self,
        identity: Identity,
        device: String,
    ) -> (Arc<ExecutorHandle>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let handle = Arc::new(ExecutorHandle::new(identity.clone(), device, tx));
        self.executors
            .entry(identity)
            .or_default()
            .push(Arc::clone(&handle));
        (handle, rx)
    }

    /// Remove a connection. Idempotent: removing an absent connection is a
    /// no-op.
    pub fn unregister(&self, identity: &Identity, id: &ExecutorId) {
        let emptied = if let Some(mut entry) = self.executors.get_mut(identity) {
            if let Some(pos) = entry.iter().position(|h| h.id == *id) {
                let removed = entry.swap_remove(pos);
                removed.mark_disconnected();
                debug!(executor_id = %id, identity = %identity, "executor unregistered");
            }
            entry.is_empty()
        } else {
            false
        };
        if emptied {
            let _ = self.executors.remove_if(identity, |_, v| v.is_empty());
        }
    }

    /// Pick a connection for `identity`.
    ///
    /// Selection policy: most-recently-registered. A fresh connection
    /// superseding a stale one from the same reconnecting executor is the
    /// common case, so the newest wins.
    pub fn select(&self, identity: &Identity) -> Option<Arc<ExecutorHandle>> {
        self.executors
            .get(identity)
            .and_then(|v| v.last().cloned())
    }

    /// Total registered connections.
    pub fn count(&self) -> usize {
        self.executors.iter().map(|e| e.value().len()).sum()
    }

    /// Connections registered for one identity.
    pub fn count_for(&self, identity: &Identity) -> usize {
        self.executors.get(identity).map_or(0, |v| v.len())
    }
}
