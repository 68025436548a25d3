//! Per-request timeline record.
//!
//! # Responsibilities
//! - Hold the identity and timing facts for one in-flight request
//! - Track the lifecycle state with terminal-state exclusivity
//! - Stay safely readable from the watchdog task, the handler task, and
//!   observers at the same time

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

/// Lifecycle states of a request timeline.
///
/// `Active` is re-entered on every watchdog tick as a liveness beat; the
/// three terminal states are mutually exclusive and final.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Admitted, not yet handed to the handler.
    Ready = 0,
    /// Handler running under watchdog supervision.
    Active = 1,
    /// Rejected before the handler ran: the request was already stale.
    Expired = 2,
    /// Interrupted mid-flight by the watchdog.
    TimedOut = 3,
    /// Handler returned within budget.
    Completed = 4,
}

impl From<u8> for LifecycleState {
    fn from(value: u8) -> Self {
        match value {
            1 => LifecycleState::Active,
            2 => LifecycleState::Expired,
            3 => LifecycleState::TimedOut,
            4 => LifecycleState::Completed,
            _ => LifecycleState::Ready,
        }
    }
}

impl LifecycleState {
    /// Terminal states can never be left once entered.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LifecycleState::Expired | LifecycleState::TimedOut | LifecycleState::Completed
        )
    }

    /// Lowercase name used in logs and response bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Ready => "ready",
            LifecycleState::Active => "active",
            LifecycleState::Expired => "expired",
            LifecycleState::TimedOut => "timed_out",
            LifecycleState::Completed => "completed",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing and lifecycle record for a single request.
///
/// Created by the middleware when the request is admitted, shared as
/// `Arc<RequestTimeline>` with the watchdog task and every registered
/// observer, and readable by handlers through the request extensions.
#[derive(Debug)]
pub struct RequestTimeline {
    /// Request id: the `X-Request-Id` hint when one was sent, else generated.
    id: String,
    /// Time spent queued upstream, when the client claimed a start timestamp.
    age: Option<Duration>,
    /// Effective deadline; `None` when no enforceable candidate exists.
    timeout: Option<Duration>,
    /// Elapsed processing milliseconds, updated while the request runs.
    duration_ms: AtomicU64,
    /// Current `LifecycleState`, stored as its `u8` discriminant.
    state: AtomicU8,
}

impl RequestTimeline {
    pub fn new(id: String, age: Option<Duration>, timeout: Option<Duration>) -> Self {
        Self {
            id,
            age,
            timeout,
            duration_ms: AtomicU64::new(0),
            state: AtomicU8::new(LifecycleState::Ready as u8),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn age(&self) -> Option<Duration> {
        self.age
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Elapsed processing time recorded so far.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms.load(Ordering::Relaxed))
    }

    /// Record elapsed processing time. Monotonic: a stale writer can never
    /// move the value backwards.
    pub fn record_duration(&self, elapsed: Duration) {
        self.duration_ms
            .fetch_max(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from(self.state.load(Ordering::Acquire))
    }

    /// Move the record into `next`, refusing to leave a terminal state.
    ///
    /// Returns whether the transition took effect. The compare-and-swap keeps
    /// the terminal states mutually exclusive even when the watchdog and the
    /// handler task race to finish the same request.
    pub(crate) fn enter(&self, next: LifecycleState) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if LifecycleState::from(current).is_terminal() {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}
