//! Deadline breach errors surfaced to the request pipeline.

use thiserror::Error;

/// Errors raised when a request's time budget is breached.
///
/// Both variants are ordinary propagated errors: the middleware maps them to
/// HTTP responses (503 for `Expired`, 504 for `TimedOut`); nothing here ever
/// aborts the process.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeadlineError {
    /// The request was already older than its admissible age when it
    /// arrived; the handler was never invoked.
    #[error("request expired: queued for {waited_secs:.1}s, budget was {budget_secs}s")]
    Expired { waited_secs: f64, budget_secs: u64 },

    /// The handler exceeded its deadline and was interrupted mid-flight.
    #[error("request ran for longer than {timeout_secs:.1}s")]
    TimedOut { timeout_secs: f64 },
}
