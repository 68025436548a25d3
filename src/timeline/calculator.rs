//! Effective-deadline calculation.
//!
//! # Responsibilities
//! - Derive the request's age from a claimed upstream start timestamp
//! - Pick the effective timeout from the configured base and the remaining
//!   admissible-age budget
//! - Flag requests whose budget was exhausted before processing began
//!
//! # Design Decisions
//! - Pure: the caller supplies `now`, so tests control the clock
//! - Millisecond integer arithmetic; the remaining budget may go negative
//! - A negative candidate is never stored as the operative timeout

use std::time::Duration;

use crate::config::DeadlineConfig;

/// Maximum admissible queueing age for an incoming request.
pub const MAX_REQUEST_AGE: Duration = Duration::from_secs(30);

/// Output of the deadline calculation for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelinePlan {
    /// Time spent queued upstream; `None` without a start timestamp.
    pub age: Option<Duration>,
    /// Effective deadline; `None` when no non-negative candidate exists.
    pub timeout: Option<Duration>,
    /// True when the remaining admissible-age budget was already exhausted.
    pub expired: bool,
}

/// Compute age, effective timeout, and staleness for one request.
///
/// `start_unix_ms` is the queueing start claimed by the client or load
/// balancer, in milliseconds since the epoch. `has_body` grants the
/// configured overtime on top of the remaining age budget, compensating for
/// upload time that already elapsed upstream.
pub fn plan_timeline(
    now_unix_ms: i64,
    start_unix_ms: Option<i64>,
    has_body: bool,
    config: &DeadlineConfig,
) -> TimelinePlan {
    let mut age = None;
    let mut remaining_ms: Option<i64> = None;

    if let Some(start_ms) = start_unix_ms {
        let age_ms = now_unix_ms.saturating_sub(start_ms);
        age = Some(Duration::from_millis(age_ms.max(0) as u64));

        let mut left = (MAX_REQUEST_AGE.as_millis() as i64).saturating_sub(age_ms);
        if has_body {
            left = left.saturating_add((config.overtime_secs as i64).saturating_mul(1000));
        }
        remaining_ms = Some(left);
    }

    // Candidates for the effective deadline; negative values never qualify.
    let base_ms = if config.timeout_secs > 0 {
        Some((config.timeout_secs as i64).saturating_mul(1000))
    } else {
        None
    };
    let timeout = [base_ms, remaining_ms]
        .into_iter()
        .flatten()
        .filter(|ms| *ms >= 0)
        .min()
        .map(|ms| Duration::from_millis(ms as u64));

    // Staleness is judged on the raw remaining budget, before the
    // non-negative filter above.
    let expired = remaining_ms.is_some_and(|ms| ms <= 0);

    TimelinePlan {
        age,
        timeout,
        expired,
    }
}
