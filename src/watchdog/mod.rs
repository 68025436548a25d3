//! Watchdog subsystem.
//!
//! # Data Flow
//!
//! ```text
//! middleware spawns one Watchdog task per supervised request
//!     → each tick: record duration, re-assert Active,
//!       sleep min(1s, remaining budget)
//!     → deadline passed: mark TimedOut, fire the CancellationSignal
//! middleware stops and joins the task on its return paths; dropping the
//! handle stops the loop when the request unwinds instead of returning
//! ```
//!
//! # Design Decisions
//! - The stop channel and the cancellation signal are separate tokens:
//!   stopping the watchdog must never look like a timeout
//! - Tick sleeps are raced against the stop token with stop checked first:
//!   stop-and-join never waits out a sleep, and a stop landing exactly at
//!   the deadline still wins

pub mod scheduler;
pub mod signal;

pub use scheduler::{Watchdog, WatchdogHandle};
pub use signal::CancellationSignal;
