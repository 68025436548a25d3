//! Request timeline subsystem.
//!
//! # Data Flow
//!
//! ```text
//! Incoming Request
//!     → calculator.rs (age, effective timeout, staleness; pure)
//!     → record.rs (RequestTimeline: id, timing facts, lifecycle state)
//!     → advance() moves the record through its states and fans each
//!       applied transition out to the observer registry
//! ```
//!
//! # Design Decisions
//! - The calculator takes `now` as an argument: no clock access, no I/O
//! - State lives in an atomic so the watchdog and the handler task can race
//!   safely without a lock
//! - Terminal states are sticky; `advance` reports refused transitions

pub mod calculator;
pub mod record;

pub use calculator::{plan_timeline, TimelinePlan, MAX_REQUEST_AGE};
pub use record::{LifecycleState, RequestTimeline};

use crate::observers::ObserverRegistry;

/// Move `timeline` into `next` and notify observers of the transition.
///
/// Observers only fire when the transition took effect; a refused transition
/// (attempting to leave a terminal state) is reported by the return value
/// and stays invisible to observers.
pub fn advance(
    timeline: &RequestTimeline,
    next: LifecycleState,
    observers: &ObserverRegistry,
) -> bool {
    let applied = timeline.enter(next);
    if applied {
        observers.notify(timeline);
    }
    applied
}
