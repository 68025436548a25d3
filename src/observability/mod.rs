//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! middleware and watchdog produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms via the metrics crate)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - The request id flows through every log line and observer callback
//! - Metric updates are cheap (atomic increments behind the recorder)
//! - The exporter is optional; without it recordings are no-ops

pub mod logging;
pub mod metrics;
