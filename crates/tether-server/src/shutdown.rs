//! Cooperative shutdown for the serve loop and socket tasks.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEFAULT_DRAIN: Duration = Duration::from_secs(30);

/// Hands out cancellation tokens and drains the tasks watching them.
///
/// Executor sockets finish in-flight reads when the token fires;
/// anything still alive at the drain deadline is aborted.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    drain: Duration,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::with_drain(DEFAULT_DRAIN)
    }

    /// Coordinator with a custom drain deadline.
    pub fn with_drain(drain: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            drain,
        }
    }

    /// Token for a task to watch.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Fire the token. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fire the token and wait for `handles` until the drain deadline,
    /// aborting whatever is left.
    pub async fn drain(&self, handles: Vec<JoinHandle<()>>) {
        self.shutdown();
        info!(tasks = handles.len(), "draining tasks");
        let mut remaining = handles;
        let deadline = tokio::time::Instant::now() + self.drain;
        for handle in &mut remaining {
            if tokio::time::timeout_at(deadline, handle).await.is_err() {
                break;
            }
        }
        let stragglers: Vec<_> = remaining.iter().filter(|h| !h.is_finished()).collect();
        if !stragglers.is_empty() {
            warn!(
                tasks = stragglers.len(),
                "drain deadline passed, aborting remaining tasks"
            );
            for handle in stragglers {
                handle.abort();
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
