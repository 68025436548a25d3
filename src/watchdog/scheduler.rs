//! The per-request watchdog loop.
//!
//! # Responsibilities
//! - Track elapsed processing time while the handler runs
//! - Re-assert `Active` at least once per second as a liveness beat
//! - Mark the request timed out and fire the cancellation signal when the
//!   deadline passes
//! - Quiesce promptly when stopped, or when the handle is dropped because
//!   the supervised request unwound

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::errors::DeadlineError;
use crate::observers::ObserverRegistry;
use crate::timeline::{advance, LifecycleState, RequestTimeline};
use crate::watchdog::signal::CancellationSignal;

/// Upper bound on a single watchdog sleep. Keeps `Active` liveness
/// notifications flowing at least once per second even under long deadlines.
const TICK: Duration = Duration::from_secs(1);

/// Deadline supervisor for one request.
pub struct Watchdog {
    timeline: Arc<RequestTimeline>,
    observers: Arc<ObserverRegistry>,
    signal: CancellationSignal,
    /// The enforced per-request deadline.
    timeout: Duration,
    /// The value reported in the timeout error: usually the per-request
    /// deadline, or the configured base when simple-errors mode wants
    /// uniform messages.
    reported_timeout: Duration,
}

impl Watchdog {
    pub fn new(
        timeline: Arc<RequestTimeline>,
        observers: Arc<ObserverRegistry>,
        signal: CancellationSignal,
        timeout: Duration,
        reported_timeout: Duration,
    ) -> Self {
        Self {
            timeline,
            observers,
            signal,
            timeout,
            reported_timeout,
        }
    }

    /// Spawn the watchdog task.
    ///
    /// The returned handle stops the loop when dropped, so a request that
    /// panics or is abandoned mid-flight takes its watchdog down with it.
    /// Normal exit paths call [`WatchdogHandle::stop`] to also wait for the
    /// task to quiesce.
    pub fn spawn(self) -> WatchdogHandle {
        let stop = CancellationToken::new();
        let task = tokio::spawn(self.run(stop.clone()));
        WatchdogHandle {
            stop: stop.drop_guard(),
            task,
        }
    }

    async fn run(self, stop: CancellationToken) {
        let started = Instant::now();
        loop {
            let elapsed = started.elapsed();
            self.timeline.record_duration(elapsed);

            let remaining = self.timeout.saturating_sub(elapsed);
            let sleep_for = remaining.min(TICK);
            if sleep_for.is_zero() {
                break;
            }

            advance(&self.timeline, LifecycleState::Active, &self.observers);

            // Biased: a stop that lands at the deadline boundary must win.
            tokio::select! {
                biased;
                _ = stop.cancelled() => return,
                _ = time::sleep(sleep_for) => {}
            }
        }

        advance(&self.timeline, LifecycleState::TimedOut, &self.observers);
        self.signal.fire(DeadlineError::TimedOut {
            timeout_secs: self.reported_timeout.as_secs_f64(),
        });
    }
}

/// Handle to a running watchdog task.
///
/// The stop token rides in a drop guard: dropping the handle cancels the
/// loop even when the supervised request unwound instead of returning. A
/// stopped watchdog performs no further transitions and never fires the
/// signal.
pub struct WatchdogHandle {
    stop: DropGuard,
    task: JoinHandle<()>,
}

impl WatchdogHandle {
    /// Stop the loop and wait for the task to quiesce.
    pub async fn stop(self) {
        let Self { stop, task } = self;
        drop(stop);
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Watchdog task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn harness(
        timeout: Duration,
    ) -> (Arc<RequestTimeline>, Arc<ObserverRegistry>, CancellationSignal) {
        let timeline = Arc::new(RequestTimeline::new("req-1".into(), None, Some(timeout)));
        (
            timeline,
            Arc::new(ObserverRegistry::new()),
            CancellationSignal::new(),
        )
    }

    #[tokio::test]
    async fn test_fires_timeout_at_deadline() {
        let timeout = Duration::from_millis(80);
        let (timeline, observers, signal) = harness(timeout);
        let handle =
            Watchdog::new(timeline.clone(), observers, signal.clone(), timeout, timeout).spawn();

        let err = time::timeout(Duration::from_secs(2), signal.fired())
            .await
            .expect("watchdog never fired");
        assert!(matches!(err, DeadlineError::TimedOut { .. }));
        assert_eq!(timeline.state(), LifecycleState::TimedOut);
        assert!(timeline.duration() >= timeout);

        // Already finished; the join must return immediately.
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_reports_configured_timeout_when_asked() {
        let timeout = Duration::from_millis(50);
        let (timeline, observers, signal) = harness(timeout);
        let handle = Watchdog::new(
            timeline,
            observers,
            signal.clone(),
            timeout,
            Duration::from_secs(15),
        )
        .spawn();

        let err = time::timeout(Duration::from_secs(2), signal.fired())
            .await
            .expect("watchdog never fired");
        assert_eq!(err, DeadlineError::TimedOut { timeout_secs: 15.0 });
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_dropping_the_handle_stops_the_loop() {
        let timeout = Duration::from_millis(200);
        let (timeline, observers, signal) = harness(timeout);
        let handle =
            Watchdog::new(timeline.clone(), observers, signal.clone(), timeout, timeout).spawn();

        // An unwinding request drops the handle without calling stop.
        drop(handle);
        time::sleep(Duration::from_millis(400)).await;

        assert_ne!(timeline.state(), LifecycleState::TimedOut);
        assert!(!signal.is_fired());
    }

    #[tokio::test]
    async fn test_stop_beats_a_simultaneous_deadline() {
        let timeout = Duration::from_millis(50);
        let (timeline, observers, signal) = harness(timeout);
        let handle =
            Watchdog::new(timeline.clone(), observers, signal.clone(), timeout, timeout).spawn();

        // Let the task enter its tick sleep, then let the deadline pass
        // without yielding, so the stop and the expired sleep become ready
        // in the same poll.
        time::sleep(Duration::from_millis(10)).await;
        std::thread::sleep(Duration::from_millis(80));
        handle.stop().await;

        assert_ne!(timeline.state(), LifecycleState::TimedOut);
        assert!(!signal.is_fired());
    }

    #[tokio::test]
    async fn test_stop_quiesces_without_timeout() {
        let timeout = Duration::from_secs(30);
        let (timeline, observers, signal) = harness(timeout);
        let handle =
            Watchdog::new(timeline.clone(), observers, signal.clone(), timeout, timeout).spawn();

        // Let the first tick land, then stop mid-sleep.
        time::sleep(Duration::from_millis(30)).await;
        let before_stop = Instant::now();
        handle.stop().await;
        assert!(
            before_stop.elapsed() < Duration::from_millis(500),
            "stop-and-join must not wait out the tick sleep"
        );

        assert_eq!(timeline.state(), LifecycleState::Active);
        assert!(!signal.is_fired());

        // Nothing moves after the join returns.
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(timeline.state(), LifecycleState::Active);
        assert!(!signal.is_fired());
    }

    #[tokio::test]
    async fn test_reasserts_active_every_tick() {
        // 1.2s deadline: ticks at ~0s and ~1s, then the partial sleep runs out.
        let timeout = Duration::from_millis(1_200);
        let timeline = Arc::new(RequestTimeline::new("req-1".into(), None, Some(timeout)));
        let signal = CancellationSignal::new();
        let observers = Arc::new(ObserverRegistry::new());
        let actives = Arc::new(Mutex::new(0u32));
        let a = actives.clone();
        observers
            .register_fn("count-active", move |t: &RequestTimeline| {
                if t.state() == LifecycleState::Active {
                    *a.lock().unwrap() += 1;
                }
            })
            .unwrap();

        let handle =
            Watchdog::new(timeline.clone(), observers, signal.clone(), timeout, timeout).spawn();
        time::timeout(Duration::from_secs(3), signal.fired())
            .await
            .expect("watchdog never fired");

        assert!(
            *actives.lock().unwrap() >= 2,
            "expected an Active beat at least once per second"
        );
        assert_eq!(timeline.state(), LifecycleState::TimedOut);
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_duration_tracks_elapsed_time() {
        let timeout = Duration::from_millis(120);
        let (timeline, observers, signal) = harness(timeout);
        let handle =
            Watchdog::new(timeline.clone(), observers, signal.clone(), timeout, timeout).spawn();

        time::timeout(Duration::from_secs(2), signal.fired())
            .await
            .expect("watchdog never fired");
        handle.stop().await;

        let d = timeline.duration();
        assert!(
            d >= Duration::from_millis(120) && d < Duration::from_secs(2),
            "recorded duration was {d:?}"
        );
    }
}
