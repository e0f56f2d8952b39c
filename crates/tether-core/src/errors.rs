//! Relay error taxonomy.
//!
//! A timeout is deliberately absent here: deadline expiry is a normal
//! resolution of a submitted request, surfaced as an outcome rather than an
//! error, and callers decide how to interpret it.

use crate::ids::{CorrelationId, Identity};

/// Failures the relay can surface to a client-facing caller.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// No executor connection is registered for the identity. Raised before
    /// any side effect: no correlation entry, no timer.
    #[error("no executor online for {identity}")]
    NoExecutorOnline {
        /// Identity the command was addressed to.
        identity: Identity,
    },

    /// A request with the same correlation id is already pending. The second
    /// submit is rejected rather than overwriting the first.
    #[error("correlation id {id} is already pending")]
    DuplicateCorrelation {
        /// The contested id.
        id: CorrelationId,
    },

    /// A command failed to serialize. Practically unreachable for the types
    /// in this crate; kept so the relay never panics on the send path.
    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RelayError {
    /// Short classification string for logging/metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoExecutorOnline { .. } => "no_executor_online",
            Self::DuplicateCorrelation { .. } => "duplicate_correlation",
            Self::Encode(_) => "encode",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_executor_message_names_identity() {
        let err = RelayError::NoExecutorOnline {
            identity: Identity::from("u2"),
        };
        assert_eq!(err.to_string(), "no executor online for u2");
        assert_eq!(err.kind(), "no_executor_online");
    }

    #[test]
    fn duplicate_message_names_id() {
        let err = RelayError::DuplicateCorrelation {
            id: CorrelationId::from("dup-1"),
        };
        assert!(err.to_string().contains("dup-1"));
        assert_eq!(err.kind(), "duplicate_correlation");
    }
}
