//! Stock observer that logs lifecycle transitions.

use crate::observers::TimelineObserver;
use crate::timeline::{LifecycleState, RequestTimeline};

/// Emits one tracing event per state transition, severity scaled to the
/// state: timeouts are errors, expiries warnings, completions debug.
///
/// Registered by the demo binary; also serves as the reference
/// `TimelineObserver` implementation.
#[derive(Debug, Default)]
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

impl TimelineObserver for LogObserver {
    fn on_transition(&self, timeline: &RequestTimeline) {
        let id = timeline.id();
        let duration_ms = timeline.duration().as_millis() as u64;
        match timeline.state() {
            LifecycleState::TimedOut => {
                tracing::error!(id = %id, duration_ms, "Request timed out");
            }
            LifecycleState::Expired => {
                let age_ms = timeline.age().map(|a| a.as_millis() as u64).unwrap_or(0);
                tracing::warn!(id = %id, age_ms, "Request expired before processing");
            }
            LifecycleState::Completed => {
                tracing::debug!(id = %id, duration_ms, "Request completed within budget");
            }
            state => {
                tracing::trace!(id = %id, state = %state, duration_ms, "Request state changed");
            }
        }
    }
}
