//! # tether-core
//!
//! Wire protocol types, identifiers, and the error taxonomy shared by the
//! relay server and its tests. No I/O lives here.
//!
//! - Command/reply records are internally-tagged JSON objects, modeled as
//!   exhaustively-matched enums — unknown tags are rejected at parse time
//!   rather than falling through silently.
//! - Correlation ids link a command sent to an executor with its eventual
//!   reply; freshly generated ids are UUIDv7.

pub mod errors;
pub mod ids;
pub mod protocol;

pub use errors::RelayError;
pub use ids::{CorrelationId, ExecutorId, Identity, ObserverId};
pub use protocol::{
    Announcement, Command, CommandMessage, NavigatePayload, OpenPayload, Reply, ReplyMessage,
};
