//! Deadline enforcement middleware.
//!
//! # Responsibilities
//! - Extract the id hint, claimed start timestamp, and body markers from the
//!   request headers
//! - Plan the timeline and reject already-stale requests before the handler
//!   runs
//! - Supervise the handler under a watchdog task and map deadline breaches to
//!   HTTP responses
//! - Expose the timeline and the cancellation signal through the request
//!   extensions
//!
//! # Design Decisions
//! - The watchdog handle stops its loop on drop, and the normal paths stop
//!   and join it explicitly: no transition or cancellation outlives the
//!   request, even when the handler panics or the client goes away
//! - Interruption is cooperative: when the signal fires first, the handler
//!   future is dropped at its next await point
//! - Expiry maps to 503 (the handler never ran), timeout to 504 (the handler
//!   was interrupted)

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::config::DeadlineConfig;
use crate::errors::DeadlineError;
use crate::observability::metrics;
use crate::observers::ObserverRegistry;
use crate::timeline::{advance, plan_timeline, LifecycleState, RequestTimeline, MAX_REQUEST_AGE};
use crate::watchdog::{CancellationSignal, Watchdog};

/// State injected into the deadline middleware.
#[derive(Clone)]
pub struct DeadlineState {
    pub config: DeadlineConfig,
    pub observers: Arc<ObserverRegistry>,
}

impl DeadlineState {
    pub fn new(config: DeadlineConfig, observers: Arc<ObserverRegistry>) -> Self {
        Self { config, observers }
    }
}

/// Raw per-request inputs read from the headers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestHints {
    /// Externally supplied request id, if any.
    pub id: Option<String>,
    /// Claimed queueing start, milliseconds since the epoch.
    pub start_unix_ms: Option<i64>,
    /// Whether the request carries a body (chunked or non-zero length).
    pub has_body: bool,
}

impl RequestHints {
    /// Read the hints out of the request headers.
    ///
    /// `X-Request-Start` accepts a bare integer of epoch milliseconds; the
    /// `t=` prefix some load balancers prepend is tolerated. Unparseable
    /// values are treated as absent rather than rejected.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let id = headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned);

        let start_unix_ms = headers
            .get("x-request-start")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_start_ms);

        let chunked = headers
            .get("transfer-encoding")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false);
        let content_length = headers
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0);

        Self {
            id,
            start_unix_ms,
            has_body: chunked || content_length > 0,
        }
    }
}

fn parse_start_ms(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix("t=").unwrap_or(trimmed);
    digits.parse::<i64>().ok().filter(|ms| *ms > 0)
}

fn unix_ms_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// The per-request orchestrator. Wraps every route the warden supervises.
pub async fn deadline_middleware(
    State(state): State<DeadlineState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let hints = RequestHints::from_headers(request.headers());
    let plan = plan_timeline(
        unix_ms_now(),
        hints.start_unix_ms,
        hints.has_body,
        &state.config,
    );

    let id = hints.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let timeline = Arc::new(RequestTimeline::new(id, plan.age, plan.timeout));
    let signal = CancellationSignal::new();
    request.extensions_mut().insert(timeline.clone());
    request.extensions_mut().insert(signal.clone());

    // Stale requests go straight to Expired; observers never see them Ready.
    if plan.expired {
        advance(&timeline, LifecycleState::Expired, &state.observers);
        metrics::record_expired();

        let waited = plan.age.unwrap_or_default();
        let mut budget = MAX_REQUEST_AGE;
        if hints.has_body {
            budget += Duration::from_secs(state.config.overtime_secs);
        }
        let error = DeadlineError::Expired {
            waited_secs: waited.as_secs_f64(),
            budget_secs: budget.as_secs(),
        };
        tracing::warn!(
            id = %timeline.id(),
            waited_ms = waited.as_millis() as u64,
            "Rejecting stale request"
        );
        return deadline_response(&timeline, &error);
    }

    advance(&timeline, LifecycleState::Ready, &state.observers);
    metrics::record_admitted();

    let admitted = Instant::now();

    let Some(timeout) = plan.timeout else {
        // No enforceable deadline: run the handler unsupervised.
        advance(&timeline, LifecycleState::Active, &state.observers);
        let response = next.run(request).await;
        timeline.record_duration(admitted.elapsed());
        advance(&timeline, LifecycleState::Completed, &state.observers);
        metrics::record_completed(admitted);
        return with_request_id(response, &timeline);
    };

    let reported_timeout = if state.config.simple_errors && state.config.timeout_secs > 0 {
        Duration::from_secs(state.config.timeout_secs)
    } else {
        timeout
    };

    // Processing starts here; the watchdog re-asserts Active on every tick.
    advance(&timeline, LifecycleState::Active, &state.observers);

    let watchdog = Watchdog::new(
        timeline.clone(),
        state.observers.clone(),
        signal.clone(),
        timeout,
        reported_timeout,
    )
    .spawn();

    let outcome = tokio::select! {
        biased;
        response = next.run(request) => Ok(response),
        error = signal.fired() => Err(error),
    };

    // Quiesce the watchdog before responding, whatever the handler did.
    watchdog.stop().await;

    match outcome {
        Ok(response) => {
            timeline.record_duration(admitted.elapsed());
            advance(&timeline, LifecycleState::Completed, &state.observers);
            metrics::record_completed(admitted);
            with_request_id(response, &timeline)
        }
        Err(error) => {
            metrics::record_timed_out();
            tracing::error!(
                id = %timeline.id(),
                duration_ms = timeline.duration().as_millis() as u64,
                "Interrupting request past its deadline"
            );
            deadline_response(&timeline, &error)
        }
    }
}

/// Map a deadline breach to its HTTP response.
fn deadline_response(timeline: &RequestTimeline, error: &DeadlineError) -> Response {
    let status = match error {
        DeadlineError::Expired { .. } => StatusCode::SERVICE_UNAVAILABLE,
        DeadlineError::TimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
    };
    with_request_id((status, error.to_string()).into_response(), timeline)
}

/// Stamp the timeline id onto the response for client-side correlation.
fn with_request_id(mut response: Response, timeline: &RequestTimeline) -> Response {
    if let Ok(value) = HeaderValue::from_str(timeline.id()) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tower::ServiceExt;

    fn app(config: DeadlineConfig, observers: Arc<ObserverRegistry>) -> Router {
        let state = DeadlineState::new(config, observers);
        Router::new()
            .route("/fast", get(|| async { "hello" }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "done"
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                state,
                deadline_middleware,
            ))
    }

    #[test]
    fn test_hints_from_plain_request() {
        let headers = HeaderMap::new();
        assert_eq!(RequestHints::from_headers(&headers), RequestHints::default());
    }

    #[test]
    fn test_hints_parse_id_start_and_body_markers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("req-42"));
        headers.insert("x-request-start", HeaderValue::from_static("t=1700000000000"));
        headers.insert("content-length", HeaderValue::from_static("128"));

        let hints = RequestHints::from_headers(&headers);
        assert_eq!(hints.id.as_deref(), Some("req-42"));
        assert_eq!(hints.start_unix_ms, Some(1_700_000_000_000));
        assert!(hints.has_body);
    }

    #[test]
    fn test_hints_chunked_marks_body() {
        let mut headers = HeaderMap::new();
        headers.insert("transfer-encoding", HeaderValue::from_static("Chunked"));
        assert!(RequestHints::from_headers(&headers).has_body);
    }

    #[test]
    fn test_hints_ignore_garbage_start() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-start", HeaderValue::from_static("yesterday"));
        assert_eq!(RequestHints::from_headers(&headers).start_unix_ms, None);

        headers.insert("x-request-start", HeaderValue::from_static("-500"));
        assert_eq!(RequestHints::from_headers(&headers).start_unix_ms, None);
    }

    #[tokio::test]
    async fn test_fast_request_completes() {
        let observers = Arc::new(ObserverRegistry::new());
        let states = Arc::new(Mutex::new(Vec::new()));
        let s = states.clone();
        observers
            .register_fn("recorder", move |t: &RequestTimeline| {
                s.lock().unwrap().push(t.state());
            })
            .unwrap();

        let app = app(DeadlineConfig::default(), observers);
        let response = app
            .oneshot(Request::builder().uri("/fast").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let seen = states.lock().unwrap().clone();
        assert_eq!(seen.first(), Some(&LifecycleState::Ready));
        assert!(seen.contains(&LifecycleState::Active));
        assert_eq!(seen.last(), Some(&LifecycleState::Completed));
        assert!(!seen.contains(&LifecycleState::TimedOut));
        assert_eq!(
            seen.iter()
                .filter(|s| **s == LifecycleState::Completed)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_stale_request_never_reaches_the_handler() {
        let observers = Arc::new(ObserverRegistry::new());
        let states = Arc::new(Mutex::new(Vec::new()));
        let s = states.clone();
        observers
            .register_fn("recorder", move |t: &RequestTimeline| {
                s.lock().unwrap().push(t.state());
            })
            .unwrap();

        let hit = Arc::new(AtomicBool::new(false));
        let h = hit.clone();
        let state = DeadlineState::new(DeadlineConfig::default(), observers);
        let app = Router::new()
            .route(
                "/work",
                get(move || {
                    let h = h.clone();
                    async move {
                        h.store(true, Ordering::SeqCst);
                        "ran"
                    }
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                state,
                deadline_middleware,
            ));

        let start = unix_ms_now() - 50_000;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/work")
                    .header("x-request-start", start.to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(
            !hit.load(Ordering::SeqCst),
            "handler must not run for an expired request"
        );
        // A stale rejection is the only transition observers ever see.
        assert_eq!(
            states.lock().unwrap().as_slice(),
            &[LifecycleState::Expired]
        );
    }

    #[tokio::test]
    async fn test_panicking_handler_does_not_leak_the_watchdog() {
        let observers = Arc::new(ObserverRegistry::new());
        let states = Arc::new(Mutex::new(Vec::new()));
        let s = states.clone();
        observers
            .register_fn("recorder", move |t: &RequestTimeline| {
                s.lock().unwrap().push(t.state());
            })
            .unwrap();

        let config = DeadlineConfig {
            timeout_secs: 1,
            ..Default::default()
        };
        let state = DeadlineState::new(config, observers);
        let app = Router::new()
            .route(
                "/boom",
                get(|| async {
                    panic!("handler blew up");
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                state,
                deadline_middleware,
            ));

        let request = Request::builder().uri("/boom").body(Body::empty()).unwrap();
        let outcome = tokio::spawn(app.oneshot(request)).await;
        assert!(outcome.is_err(), "the handler panic must surface");

        // Well past the deadline: a leaked watchdog would have marked
        // TimedOut by now.
        tokio::time::sleep(Duration::from_millis(1_600)).await;
        let seen = states.lock().unwrap().clone();
        assert!(
            !seen.contains(&LifecycleState::TimedOut),
            "watchdog outlived its request: {seen:?}"
        );
    }

    #[tokio::test]
    async fn test_abandoned_request_stops_its_watchdog() {
        let observers = Arc::new(ObserverRegistry::new());
        let states = Arc::new(Mutex::new(Vec::new()));
        let s = states.clone();
        observers
            .register_fn("recorder", move |t: &RequestTimeline| {
                s.lock().unwrap().push(t.state());
            })
            .unwrap();

        let config = DeadlineConfig {
            timeout_secs: 1,
            ..Default::default()
        };
        let app = app(config, observers);

        // Dropping the request future mid-flight stands in for a client
        // that went away.
        let request = Request::builder().uri("/slow").body(Body::empty()).unwrap();
        let abandoned =
            tokio::time::timeout(Duration::from_millis(100), app.oneshot(request)).await;
        assert!(abandoned.is_err(), "the slow handler must be abandoned");

        tokio::time::sleep(Duration::from_millis(1_600)).await;
        let seen = states.lock().unwrap().clone();
        assert!(
            !seen.contains(&LifecycleState::TimedOut),
            "watchdog outlived its request: {seen:?}"
        );
    }

    #[tokio::test]
    async fn test_slow_request_times_out() {
        let config = DeadlineConfig {
            timeout_secs: 1,
            ..Default::default()
        };
        let app = app(config, Arc::new(ObserverRegistry::new()));

        let started = Instant::now();
        let response = app
            .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(
            elapsed >= Duration::from_secs(1) && elapsed < Duration::from_secs(3),
            "interrupted after {elapsed:?}"
        );

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"request ran for longer than 1.0s");
    }

    #[tokio::test]
    async fn test_handler_sees_timeline_and_signal_in_extensions() {
        let state =
            DeadlineState::new(DeadlineConfig::default(), Arc::new(ObserverRegistry::new()));
        let app = Router::new()
            .route(
                "/introspect",
                get(
                    |axum::Extension(timeline): axum::Extension<Arc<RequestTimeline>>,
                     axum::Extension(signal): axum::Extension<CancellationSignal>| async move {
                        assert!(!signal.is_fired());
                        timeline.id().to_string()
                    },
                ),
            )
            .layer(axum::middleware::from_fn_with_state(
                state,
                deadline_middleware,
            ));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/introspect")
                    .header("x-request-id", "introspect-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"introspect-1");
    }

    #[tokio::test]
    async fn test_external_id_is_echoed() {
        let app = app(DeadlineConfig::default(), Arc::new(ObserverRegistry::new()));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/fast")
                    .header("x-request-id", "trace-me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-request-id").unwrap(), "trace-me");
    }
}
