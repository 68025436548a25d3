//! Observer registration and fan-out.
//!
//! # Responsibilities
//! - Hold the process-wide set of lifecycle observers
//! - Enforce unique observer ids at registration time
//! - Fan every applied state transition out to observers, in registration
//!   order, synchronously on the transitioning task
//! - Contain a panicking observer to the transition that invoked it

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use crate::timeline::RequestTimeline;

/// A lifecycle observer, called on every state transition of any supervised
/// request.
///
/// Implementations must be cheap and non-blocking: they run inline on
/// whichever task performed the transition (the watchdog for `Active` and
/// `TimedOut`, the request task otherwise). Closures get a blanket
/// implementation, so `register_fn` and a hand-written observer type land in
/// the same slot.
pub trait TimelineObserver: Send + Sync {
    fn on_transition(&self, timeline: &RequestTimeline);
}

impl<F> TimelineObserver for F
where
    F: Fn(&RequestTimeline) + Send + Sync,
{
    fn on_transition(&self, timeline: &RequestTimeline) {
        self(timeline)
    }
}

/// Errors from observer registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    /// The id is already taken by a live registration.
    #[error("observer id '{0}' is already registered")]
    DuplicateId(String),
    /// Observer ids must be non-empty.
    #[error("observer id must not be empty")]
    InvalidId,
}

struct ObserverEntry {
    id: String,
    observer: Arc<dyn TimelineObserver>,
}

/// Process-wide registry of lifecycle observers.
///
/// Created once at startup and shared via `Arc`. Registration,
/// unregistration, and notification are mutually exclusive behind one lock;
/// entries are kept in registration order, which is also notification order.
/// A lock poisoned by a panicking observer is recovered, never propagated.
#[derive(Default)]
pub struct ObserverRegistry {
    entries: Mutex<Vec<ObserverEntry>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer under a unique, non-empty id.
    pub fn register(
        &self,
        id: impl Into<String>,
        observer: Arc<dyn TimelineObserver>,
    ) -> Result<(), RegisterError> {
        let id = id.into();
        if id.is_empty() {
            return Err(RegisterError::InvalidId);
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.iter().any(|entry| entry.id == id) {
            return Err(RegisterError::DuplicateId(id));
        }
        entries.push(ObserverEntry { id, observer });
        Ok(())
    }

    /// Register a bare callback under a unique, non-empty id.
    pub fn register_fn<F>(&self, id: impl Into<String>, callback: F) -> Result<(), RegisterError>
    where
        F: Fn(&RequestTimeline) + Send + Sync + 'static,
    {
        self.register(id, Arc::new(callback))
    }

    /// Remove a registration; unknown ids are ignored.
    pub fn unregister(&self, id: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|entry| entry.id != id);
    }

    /// Invoke every observer with the current timeline, in registration
    /// order, on the calling task.
    ///
    /// The lock is held for the whole fan-out, so observers must not call
    /// back into the registry. A panicking observer unwinds out of the
    /// transition that invoked it; the registry recovers the poisoned lock,
    /// so later transitions keep notifying.
    pub fn notify(&self, timeline: &RequestTimeline) {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for entry in entries.iter() {
            entry.observer.on_transition(timeline);
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
