//! # tether-server
//!
//! The relay between web clients and remote executor processes.
//!
//! - Executor gateway: persistent WebSocket connections registered by
//!   identity, usable the moment they connect (before any hello).
//! - Correlation layer: request/reply matching with per-command deadlines,
//!   exactly-once resolution.
//! - Observer fan-out: live SSE mirror of every raw executor message.
//! - HTTP surface: session commands, event stream, health, metrics.

pub mod config;
pub mod health;
pub mod http;
pub mod metrics;
pub mod observers;
pub mod pending;
pub mod registry;
pub mod relay;
pub mod server;
pub mod shutdown;
pub mod ws;

pub use config::ServerConfig;
pub use relay::{RelayService, SubmitOutcome};
pub use server::{AppState, ServerHandle, build_router, start};
