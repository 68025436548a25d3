//! Cooperative cancellation between the watchdog and the handler.

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use crate::errors::DeadlineError;

/// Single-shot cancellation channel from the watchdog into the handler's
/// execution context.
///
/// The middleware races the handler future against [`fired`](Self::fired);
/// handlers doing long side-effectful work can clone the signal out of the
/// request extensions and race their own await points against it. Firing
/// after the handler already finished is harmless: nothing is listening any
/// more.
#[derive(Clone, Default)]
pub struct CancellationSignal {
    inner: Arc<SignalInner>,
}

#[derive(Default)]
struct SignalInner {
    token: CancellationToken,
    error: OnceLock<DeadlineError>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver the signal, carrying the deadline error to whoever listens.
    ///
    /// At most one delivery wins; the return value reports whether this call
    /// was it.
    pub fn fire(&self, error: DeadlineError) -> bool {
        if self.inner.error.set(error).is_err() {
            return false;
        }
        self.inner.token.cancel();
        true
    }

    /// Resolves once the signal has been delivered, yielding the error.
    pub async fn fired(&self) -> DeadlineError {
        self.inner.token.cancelled().await;
        // `fire` records the error before cancelling the token.
        self.inner
            .error
            .get()
            .cloned()
            .unwrap_or(DeadlineError::TimedOut { timeout_secs: 0.0 })
    }

    /// Whether the signal has been delivered.
    pub fn is_fired(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// The error carried by a delivered signal.
    pub fn error(&self) -> Option<DeadlineError> {
        self.inner.error.get().cloned()
    }
}
