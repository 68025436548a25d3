//! Demo HTTP server with the deadline middleware installed.
//!
//! # Responsibilities
//! - Build the Axum router with the deadline middleware over every route
//! - Provide health/echo/sleep handlers for exercising the warden
//! - Serve with graceful shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Path;
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::{middleware, Extension, Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::WardenConfig;
use crate::http::middleware::{deadline_middleware, DeadlineState};
use crate::observers::ObserverRegistry;
use crate::timeline::RequestTimeline;

/// HTTP server wrapping the demo routes in the deadline middleware.
pub struct WardenServer {
    router: Router,
}

impl WardenServer {
    /// Create a new server from config and the process-wide observer
    /// registry.
    pub fn new(config: &WardenConfig, observers: Arc<ObserverRegistry>) -> Self {
        let state = DeadlineState::new(config.deadline.clone(), observers);
        let router = Self::build_router(state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: DeadlineState) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/echo", any(echo_handler))
            .route("/sleep/{millis}", get(sleep_handler))
            .layer(middleware::from_fn_with_state(state, deadline_middleware))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until the shutdown token fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Health check. Supervised like everything else, just quick about it.
async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Echo the warden's view of this request back to the caller.
async fn echo_handler(
    Extension(timeline): Extension<Arc<RequestTimeline>>,
    body: String,
) -> impl IntoResponse {
    Json(json!({
        "id": timeline.id(),
        "state": timeline.state().as_str(),
        "age_ms": timeline.age().map(|a| a.as_millis() as u64),
        "timeout_ms": timeline.timeout().map(|t| t.as_millis() as u64),
        "received_bytes": body.len(),
    }))
}

/// Sleep for the requested number of milliseconds before answering. The
/// handler used to demonstrate deadline breaches.
async fn sleep_handler(Path(millis): Path<u64>) -> impl IntoResponse {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    Json(json!({ "slept_ms": millis }))
}
