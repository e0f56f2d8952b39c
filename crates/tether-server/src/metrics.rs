//! Relay metric names and the Prometheus recorder.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder and return the handle that
/// `/metrics` renders from. Call once, before any counter is touched;
/// a second install would mean two recorders fighting for the global
/// slot, so startup aborts instead.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("metrics recorder already installed");
    info!("metrics recorder installed");
    handle
}

// Counter names, kept in one place so relay/ws/observer modules agree.

/// Commands submitted to executors (counter, labels: type).
pub const RELAY_COMMANDS_TOTAL: &str = "relay_commands_total";
/// Submits that hit the deadline with no reply (counter, labels: type).
pub const RELAY_TIMEOUTS_TOTAL: &str = "relay_command_timeouts_total";
/// Submits rejected because no executor was online (counter).
pub const RELAY_NO_EXECUTOR_TOTAL: &str = "relay_no_executor_total";
/// Inbound replies that matched no pending request (counter).
pub const RELAY_UNMATCHED_REPLIES_TOTAL: &str = "relay_unmatched_replies_total";
/// Executor WebSocket connections opened (counter).
pub const WS_EXECUTORS_CONNECTED_TOTAL: &str = "ws_executors_connected_total";
/// Executor WebSocket connections closed (counter).
pub const WS_EXECUTORS_DISCONNECTED_TOTAL: &str = "ws_executors_disconnected_total";
/// Observer sinks evicted after a refused write (counter).
pub const SSE_OBSERVER_DROPS_TOTAL: &str = "sse_observer_drops_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_and_render() {
        // Build a recorder + handle without installing globally, so parallel
        // tests don't fight over the global recorder slot.
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = handle.render();
        assert!(output.is_empty() || output.contains('\n') || output.contains('#'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            RELAY_COMMANDS_TOTAL,
            RELAY_TIMEOUTS_TOTAL,
            RELAY_NO_EXECUTOR_TOTAL,
            RELAY_UNMATCHED_REPLIES_TOTAL,
            WS_EXECUTORS_CONNECTED_TOTAL,
            WS_EXECUTORS_DISCONNECTED_TOTAL,
            SSE_OBSERVER_DROPS_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
