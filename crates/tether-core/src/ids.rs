//! Identifier newtypes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity used when a request or connection carries none.
pub const DEFAULT_IDENTITY: &str = "demo-user";

/// Opaque key grouping a client's executor connections, observers, and
/// in-flight requests. String equality is the only constraint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub String);

impl Identity {
    /// Wrap a raw identity string.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Identity from an optional source, falling back to the default.
    pub fn or_default(value: Option<&str>) -> Self {
        match value {
            Some(s) if !s.is_empty() => Self(s.to_owned()),
            _ => Self::default(),
        }
    }

    /// The raw string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self(DEFAULT_IDENTITY.to_owned())
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identifier linking a command sent to an executor with its eventual reply.
///
/// Clients may supply their own; ids generated by the relay are UUIDv7.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    /// Generate a fresh id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Unique id for a registered executor connection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExecutorId(pub String);

impl ExecutorId {
    /// Generate a fresh `exec_<uuidv7>` id.
    pub fn new() -> Self {
        Self(format!("exec_{}", Uuid::now_v7()))
    }
}

impl Default for ExecutorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique id for a registered observer stream.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(pub String);

impl ObserverId {
    /// Generate a fresh `obs_<uuidv7>` id.
    pub fn new() -> Self {
        Self(format!("obs_{}", Uuid::now_v7()))
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
