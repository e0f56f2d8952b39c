//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_core::protocol::Command;

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// Port to bind (default `8080`; `0` auto-assigns, used in tests).
    pub port: u16,
    /// Per-executor outbound command queue depth.
    pub max_send_queue: usize,
    /// Per-observer event queue depth.
    pub observer_queue: usize,
    /// Deadline for open/navigate-class commands, in seconds.
    pub command_timeout_secs: u64,
    /// Deadline for screenshot-class commands, in seconds. Longer than the
    /// navigation budget: encoding a full-page capture takes a while.
    pub screenshot_timeout_secs: u64,
    /// Deadline for close/reset/ping commands, in seconds.
    pub control_timeout_secs: u64,
    /// Interval between protocol-level pings to executors, in seconds.
    pub heartbeat_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            max_send_queue: 256,
            observer_queue: 256,
            command_timeout_secs: 15,
            screenshot_timeout_secs: 30,
            control_timeout_secs: 10,
            heartbeat_interval_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Build a config from the environment: `TETHER_HOST` and `PORT`
    /// override the defaults, anything unparseable falls back silently.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(host) = std::env::var("TETHER_HOST") {
            if !host.is_empty() {
                cfg.host = host;
            }
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            cfg.port = port;
        }
        cfg
    }

    /// Deadline for a command, keyed on its type class.
    pub fn timeout_for(&self, command: &Command) -> Duration {
        let secs = match command {
            Command::Screenshot => self.screenshot_timeout_secs,
            Command::Open { .. } | Command::Navigate { .. } => self.command_timeout_secs,
            Command::Close | Command::Reset | Command::Ping => self.control_timeout_secs,
        };
        Duration::from_secs(secs)
    }

    /// Heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::protocol::{NavigatePayload, OpenPayload};

    #[test]
    fn default_port() {
        assert_eq!(ServerConfig::default().port, 8080);
    }

    #[test]
    fn default_host_binds_all_interfaces() {
        assert_eq!(ServerConfig::default().host, "0.0.0.0");
    }

    #[test]
    fn screenshot_budget_exceeds_navigation_budget() {
        let cfg = ServerConfig::default();
        assert!(cfg.screenshot_timeout_secs > cfg.command_timeout_secs);
    }

    #[test]
    fn timeout_for_command_classes() {
        let cfg = ServerConfig::default();
        assert_eq!(
            cfg.timeout_for(&Command::Screenshot),
            Duration::from_secs(cfg.screenshot_timeout_secs)
        );
        assert_eq!(
            cfg.timeout_for(&Command::Open {
                payload: Some(OpenPayload { url: None })
            }),
            Duration::from_secs(cfg.command_timeout_secs)
        );
        assert_eq!(
            cfg.timeout_for(&Command::Navigate {
                payload: NavigatePayload {
                    url: "https://example.com".into()
                }
            }),
            Duration::from_secs(cfg.command_timeout_secs)
        );
        assert_eq!(
            cfg.timeout_for(&Command::Close),
            Duration::from_secs(cfg.control_timeout_secs)
        );
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = ServerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.port, cfg.port);
        assert_eq!(back.max_send_queue, cfg.max_send_queue);
    }
}
