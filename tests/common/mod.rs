//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::task::JoinHandle;
use tracing::Span;
use trusted_edge::config::ListenerSpec;
use trusted_edge::http::default_app;
use trusted_edge::lifecycle::{RuntimeError, RuntimeOptions, ServerRuntime};

/// Build a runtime serving `app` on `listeners`.
pub fn runtime_with_app(listeners: Vec<ListenerSpec>, app: Router) -> Arc<ServerRuntime> {
    let options = RuntimeOptions {
        shutdown_timeout: Duration::from_secs(5),
        ..RuntimeOptions::default()
    };
    Arc::new(ServerRuntime::new(listeners, app, options, Span::none()).unwrap())
}

/// Build a runtime serving the built-in routes on `listeners`.
#[allow(dead_code)]
pub fn runtime(listeners: Vec<ListenerSpec>) -> Arc<ServerRuntime> {
    runtime_with_app(listeners, default_app())
}

/// Run the runtime in the background.
pub fn spawn_run(runtime: &Arc<ServerRuntime>) -> JoinHandle<Result<(), RuntimeError>> {
    let runtime = Arc::clone(runtime);
    tokio::spawn(async move { runtime.run().await })
}

/// Wait for listener `index` to be bound.
#[allow(dead_code)]
pub async fn wait_listening(runtime: &ServerRuntime, index: usize) -> SocketAddr {
    tokio::time::timeout(Duration::from_secs(5), runtime.listening(index))
        .await
        .expect("listener did not bind in time")
        .expect("listener failed to bind")
}

/// HTTP client that never goes through a system proxy.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Wait until the runtime is handling at least `count` requests.
#[allow(dead_code)]
pub async fn wait_in_flight(runtime: &ServerRuntime, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while runtime.in_flight() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("requests never reached the handler");
}
