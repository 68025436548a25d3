//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use request_warden::config::WardenConfig;
use request_warden::{ObserverRegistry, WardenServer};

/// Bind the demo server on an ephemeral port and run it in the background.
/// Returns the bound address and the token that shuts the server down.
pub async fn start_server(
    config: WardenConfig,
    observers: Arc<ObserverRegistry>,
) -> (SocketAddr, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();

    let server = WardenServer::new(&config, observers);
    let token = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, token).await;
    });

    (addr, shutdown)
}

/// A reqwest client that talks straight to the local server.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Milliseconds since the epoch, for forging X-Request-Start headers.
#[allow(dead_code)]
pub fn unix_ms_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}
