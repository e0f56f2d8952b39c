//! Relay service: command submission, correlation, and inbound dispatch.
//!
//! `submit` is the caller-visible suspension point: it sends a command on a
//! selected executor connection and races the matching reply against a
//! deadline. Both outcomes are successful completions of the future — a
//! timeout is a normal resolution the caller interprets, never a hang.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use crate::config::ServerConfig;
use crate::metrics::{
    RELAY_COMMANDS_TOTAL, RELAY_NO_EXECUTOR_TOTAL, RELAY_TIMEOUTS_TOTAL,
    RELAY_UNMATCHED_REPLIES_TOTAL,
};
use crate::observers::ObserverRegistry;
use crate::pending::PendingTable;
use crate::registry::ExecutorRegistry;
use tether_core::errors::RelayError;
use tether_core::ids::Identity;
use tether_core::protocol::{
    Announcement, Command, CommandMessage, NavigatePayload, OpenPayload, ReplyMessage,
};

/// Terminal outcome of a submitted request.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// A reply with the matching correlation id arrived before the deadline.
    Reply(ReplyMessage),
    /// The deadline elapsed first. The entry is gone; a reply arriving later
    /// is a correlation no-op.
    TimedOut,
}

/// The relay between clients and executors. Owns the three shared registries;
/// constructed once at startup and injected into handlers via `AppState`.
pub struct RelayService {
    executors: ExecutorRegistry,
    observers: ObserverRegistry,
    pending: PendingTable,
    config: ServerConfig,
}

impl RelayService {
    /// Build a relay from the server configuration.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            executors: ExecutorRegistry::new(config.max_send_queue),
            observers: ObserverRegistry::new(config.observer_queue),
            pending: PendingTable::new(),
            config,
        }
    }

    /// Executor connection registry.
    pub fn executors(&self) -> &ExecutorRegistry {
        &self.executors
    }

    /// Observer stream registry.
    pub fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }

    /// In-flight request table.
    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    /// Server configuration this relay was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Submit a command to an executor for `identity` with a fresh
    /// correlation id and the command-class default deadline.
    pub async fn submit(
        &self,
        identity: &Identity,
        command: Command,
    ) -> Result<SubmitOutcome, RelayError> {
        let timeout = self.config.timeout_for(&command);
        self.submit_message(identity, CommandMessage::new(command), timeout)
            .await
    }

    /// Submit a fully-formed command message with an explicit deadline.
    ///
    /// Fails immediately with [`RelayError::NoExecutorOnline`] when no
    /// connection is registered for `identity`: no table entry is created
    /// and no timer is armed.
    #[instrument(skip_all, fields(identity = %identity, command = message.command.kind(), id = %message.id))]
    pub async fn submit_message(
        &self,
        identity: &Identity,
        message: CommandMessage,
        timeout: Duration,
    ) -> Result<SubmitOutcome, RelayError> {
        let Some(conn) = self.executors.select(identity) else {
            counter!(RELAY_NO_EXECUTOR_TOTAL).increment(1);
            return Err(RelayError::NoExecutorOnline {
                identity: identity.clone(),
            });
        };

        let json = serde_json::to_string(&message)?;
        let id = message.id.clone();

        let (tx, mut rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx)?;

        if !conn.send(json) {
            // Dead or saturated connection: tear the entry back down (no
            // side effects survive) and drop the connection from the pool.
            let _ = self.pending.remove(&id);
            self.executors.unregister(identity, &conn.id);
            warn!(executor_id = %conn.id, "executor connection refused command, unregistering");
            counter!(RELAY_NO_EXECUTOR_TOTAL).increment(1);
            return Err(RelayError::NoExecutorOnline {
                identity: identity.clone(),
            });
        }

        counter!(RELAY_COMMANDS_TOTAL, "type" => message.command.kind()).increment(1);
        debug!(timeout_secs = timeout.as_secs(), "command sent, awaiting reply");

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(reply)) => Ok(SubmitOutcome::Reply(reply)),
            // The sender is dropped without resolving only if the entry is
            // explicitly removed, which nothing else does for a live submit.
            Ok(Err(_closed)) => {
                let _ = self.pending.remove(&id);
                Ok(SubmitOutcome::TimedOut)
            }
            Err(_elapsed) => {
                if self.pending.remove(&id) {
                    // Dropping the timed-out receiver is the timer
                    // cancellation; no timer handle outlives the race.
                    counter!(RELAY_TIMEOUTS_TOTAL, "type" => message.command.kind()).increment(1);
                    debug!("deadline elapsed with no reply");
                    Ok(SubmitOutcome::TimedOut)
                } else {
                    // The dispatcher removed the entry at the last instant;
                    // the reply is already in the channel. Prefer it.
                    match rx.try_recv() {
                        Ok(reply) => Ok(SubmitOutcome::Reply(reply)),
                        Err(_) => Ok(SubmitOutcome::TimedOut),
                    }
                }
            }
        }
    }

    /// Open a browser session, optionally loading `url`.
    pub async fn open(
        &self,
        identity: &Identity,
        url: Option<String>,
    ) -> Result<SubmitOutcome, RelayError> {
        self.submit(
            identity,
            Command::Open {
                payload: Some(OpenPayload { url }),
            },
        )
        .await
    }

    /// Navigate the session to `url`.
    pub async fn navigate(
        &self,
        identity: &Identity,
        url: String,
    ) -> Result<SubmitOutcome, RelayError> {
        self.submit(
            identity,
            Command::Navigate {
                payload: NavigatePayload { url },
            },
        )
        .await
    }

    /// Capture a screenshot of the session.
    pub async fn screenshot(&self, identity: &Identity) -> Result<SubmitOutcome, RelayError> {
        self.submit(identity, Command::Screenshot).await
    }

    /// Close the session. Interpreting a timeout as assumed success is the
    /// HTTP layer's concern; here it is an ordinary outcome.
    pub async fn stop(&self, identity: &Identity) -> Result<SubmitOutcome, RelayError> {
        self.submit(identity, Command::Close).await
    }

    /// Dispatch one inbound frame from an executor connection.
    ///
    /// Two independent outcomes of every frame: (a) fan-out to all observers
    /// of the identity, unconditionally; (b) best-effort correlation if the
    /// frame parses as a reply. Unparseable frames are dropped without ever
    /// propagating — the read loop must not die on garbage.
    pub fn handle_inbound(&self, identity: &Identity, raw: &str) {
        self.observers.publish(identity, raw);

        match serde_json::from_str::<ReplyMessage>(raw) {
            Ok(reply) => {
                let id = reply.id.clone();
                if self.pending.resolve(reply) {
                    debug!(identity = %identity, id = %id, "reply correlated");
                } else {
                    counter!(RELAY_UNMATCHED_REPLIES_TOTAL).increment(1);
                    debug!(identity = %identity, id = %id, "reply matched no pending request");
                }
            }
            Err(_) => match serde_json::from_str::<Announcement>(raw) {
                Ok(Announcement::Hello {
                    hostname,
                    platform,
                    agent_version,
                }) => {
                    info!(
                        identity = %identity,
                        hostname = hostname.as_deref().unwrap_or("?"),
                        platform = platform.as_deref().unwrap_or("?"),
                        version = agent_version.as_deref().unwrap_or("?"),
                        "executor announced itself"
                    );
                }
                Err(_) => {
                    debug!(identity = %identity, len = raw.len(), "unparseable executor frame dropped");
                }
            },
        }
    }
}
