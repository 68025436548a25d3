//! Request deadline enforcement middleware.
//!
//! request-warden supervises each in-flight HTTP request with a watchdog
//! task: the effective deadline is computed from the configured limits and
//! any queueing time the client claims, stale requests are rejected before
//! the handler runs, and a handler that overstays its budget is interrupted
//! cooperatively. Every lifecycle transition fans out to a registry of
//! observers.

pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod observers;
pub mod timeline;
pub mod watchdog;

pub use config::WardenConfig;
pub use errors::DeadlineError;
pub use http::{deadline_middleware, DeadlineState, WardenServer};
pub use observers::{LogObserver, ObserverRegistry, TimelineObserver};
pub use timeline::{LifecycleState, RequestTimeline};
pub use watchdog::CancellationSignal;
