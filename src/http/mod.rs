//! HTTP subsystem: the deadline middleware and the demo server around it.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → middleware.rs (plan timeline, reject stale, supervise handler)
//!     → route handlers (health / echo / sleep)
//!     → middleware stamps x-request-id on the way out
//! ```

pub mod middleware;
pub mod server;

pub use middleware::{deadline_middleware, DeadlineState, RequestHints};
pub use server::WardenServer;
