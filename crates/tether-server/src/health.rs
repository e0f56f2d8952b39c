//! `/health` endpoint body.

use std::time::Instant;

use serde::Serialize;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the relay is running.
    pub status: String,
    /// Seconds since startup.
    pub uptime_secs: u64,
    /// Currently registered executor connections.
    pub executors: usize,
    /// Currently registered observer streams.
    pub observers: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, executors: usize, observers: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        executors,
        observers,
    }
}
