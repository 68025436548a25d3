//! Metrics collection and exposition.
//!
//! # Metrics
//! - `warden_requests_total` (counter): requests admitted by the middleware
//! - `warden_completed_total` (counter): handlers that finished within budget
//! - `warden_expired_total` (counter): requests rejected as stale on arrival
//! - `warden_timeouts_total` (counter): handlers interrupted at the deadline
//! - `warden_request_duration_seconds` (histogram): latency of completed
//!   requests
//!
//! # Design Decisions
//! - Recording goes through the global recorder; without an installed
//!   exporter every call is a no-op, so the library never forces a listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on the given address. Failure to bind is
/// logged, not fatal: the warden keeps enforcing deadlines without metrics.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

/// Record an admitted request.
pub fn record_admitted() {
    counter!("warden_requests_total").increment(1);
}

/// Record a handler that finished within budget.
pub fn record_completed(start: Instant) {
    counter!("warden_completed_total").increment(1);
    histogram!("warden_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Record a request rejected as stale before the handler ran.
pub fn record_expired() {
    counter!("warden_expired_total").increment(1);
}

/// Record a handler interrupted at its deadline.
pub fn record_timed_out() {
    counter!("warden_timeouts_total").increment(1);
}
