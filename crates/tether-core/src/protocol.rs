//! Relay ↔ executor wire protocol.
//!
//! Commands travel relay → executor as `{id, type, payload?}`; replies travel
//! executor → relay as `{id, type, result?|error?}`. A first `hello`
//! announcement may arrive on a fresh connection but is never required for
//! routing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::CorrelationId;

/// Payload for the `open` command. The URL is optional — opening without one
/// just spawns a fresh browser session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenPayload {
    /// Target URL to load after the session opens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Payload for the `navigate` command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavigatePayload {
    /// Target URL.
    pub url: String,
}

/// Command sent relay → executor. Unknown type tags fail to parse.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Command {
    /// Open a browser session, optionally loading a URL.
    Open {
        /// Optional target URL.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<OpenPayload>,
    },
    /// Navigate the current session to a URL.
    Navigate {
        /// Target URL.
        payload: NavigatePayload,
    },
    /// Capture a full-page screenshot.
    Screenshot,
    /// Close the session. Idempotent on the executor side.
    Close,
    /// Tear down and forget all session state.
    Reset,
    /// Application-level liveness probe; the executor answers `pong`.
    Ping,
}

impl Command {
    /// Short tag for logging and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Navigate { .. } => "navigate",
            Self::Screenshot => "screenshot",
            Self::Close => "close",
            Self::Reset => "reset",
            Self::Ping => "ping",
        }
    }
}

/// A command with its correlation id, as serialized on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    /// Correlation id echoed back by the executor's reply.
    pub id: CorrelationId,
    /// The command itself (`type` + `payload` on the wire).
    #[serde(flatten)]
    pub command: Command,
}

impl CommandMessage {
    /// Build a message with a freshly generated correlation id.
    pub fn new(command: Command) -> Self {
        Self {
            id: CorrelationId::generate(),
            command,
        }
    }
}

/// Reply sent executor → relay. Unknown type tags fail to parse.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Reply {
    /// Successful completion, carrying an optional result payload.
    Status {
        /// Executor-side state marker, typically `"done"`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<String>,
        /// Command-specific result object.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },
    /// The executor failed to run the command.
    Error {
        /// Executor-provided error text.
        error: String,
    },
    /// Answer to a `ping` command.
    Pong,
}

/// A reply with the correlation id it answers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplyMessage {
    /// Correlation id of the command being answered.
    pub id: CorrelationId,
    /// The reply itself.
    #[serde(flatten)]
    pub reply: Reply,
}

/// First message an executor may send after connecting. Informational only:
/// routing keys on the connection's identity, not on handshake completion.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Announcement {
    /// Host/platform/version announcement.
    Hello {
        /// Executor hostname.
        #[serde(default)]
        hostname: Option<String>,
        /// Executor platform.
        #[serde(default)]
        platform: Option<String>,
        /// Executor version string.
        #[serde(default, rename = "agentVersion")]
        agent_version: Option<String>,
    },
}
