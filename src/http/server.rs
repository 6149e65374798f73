//! Per-listener HTTP server.
//!
//! # Responsibilities
//! - Build the handler pipeline for one listener
//! - Wire up middleware (request ID, tracing, request drain, forwarded identity)
//! - Bind the configured address, plain or TLS
//! - Stop gracefully: drain in-flight requests, then close connections
//!   through an `axum_server::Handle`

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{middleware, Router};
use axum_server::Handle;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{Instrument, Span};

use crate::config::ListenerSpec;
use crate::http::middleware::{drain_middleware, forwarded_identity_middleware, ListenerContext, RequestDrain};
use crate::net::{resolve_bind_addr, tls::load_tls_config, ListenerInfo};
use crate::security::ProxyHeaderResolver;

/// HTTP server for a single listener.
///
/// Cloning is cheap; clones share the same shutdown handle and drain state.
#[derive(Clone)]
pub struct ListenerServer {
    spec: Arc<ListenerSpec>,
    info: ListenerInfo,
    router: Router,
    handle: Handle,
    drain: RequestDrain,
    span: Span,
}

impl ListenerServer {
    /// Prepare a server for `spec` in front of the shared `app`.
    pub fn new(
        index: usize,
        spec: ListenerSpec,
        resolver: Arc<ProxyHeaderResolver>,
        app: Router,
        span: Span,
    ) -> Self {
        let info = ListenerInfo::new(index, &spec);
        let ctx = ListenerContext {
            resolver,
            info: info.clone(),
        };
        let drain = RequestDrain::new();
        let router = Self::build_router(app, ctx, drain.clone());

        Self {
            spec: Arc::new(spec),
            info,
            router,
            handle: Handle::new(),
            drain,
            span,
        }
    }

    /// Build the listener pipeline: request ID → trace → drain → identity → app.
    fn build_router(app: Router, ctx: ListenerContext, drain: RequestDrain) -> Router {
        app.layer(middleware::from_fn_with_state(ctx, forwarded_identity_middleware))
            .layer(middleware::from_fn_with_state(drain, drain_middleware))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn info(&self) -> &ListenerInfo {
        &self.info
    }

    pub fn spec(&self) -> &ListenerSpec {
        &self.spec
    }

    /// Wait until the listener is bound. `None` if binding failed.
    pub async fn listening(&self) -> Option<SocketAddr> {
        self.handle.listening().await
    }

    /// Number of requests this listener is currently handling.
    pub fn in_flight(&self) -> usize {
        self.drain.in_flight()
    }

    /// Request a graceful stop. In-flight requests get until `deadline` to
    /// finish; connections still open after that are closed.
    pub fn stop(&self, deadline: Duration) {
        self.drain.request_stop(deadline);
    }

    /// Bind and serve until the handle is shut down.
    ///
    /// Returns `Ok(())` only for an intentional shutdown.
    pub async fn serve(self) -> io::Result<()> {
        let span = self.span.clone();
        self.serve_inner().instrument(span).await
    }

    async fn serve_inner(self) -> io::Result<()> {
        let server = self.clone().accept_connections();
        tokio::pin!(server);

        tokio::select! {
            result = &mut server => return result,
            () = self.close_when_drained() => {}
        }

        server.await
    }

    async fn accept_connections(self) -> io::Result<()> {
        let addr = resolve_bind_addr(&self.spec.address).await?;
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        match self.spec.tls_paths() {
            Some((cert, key)) => {
                let tls = load_tls_config(&self.spec.address, cert, key).await?;
                tracing::info!(address = %addr, "HTTPS listener starting");
                axum_server::bind_rustls(addr, tls)
                    .handle(self.handle)
                    .serve(app)
                    .await?;
            }
            None => {
                tracing::info!(address = %addr, "HTTP listener starting");
                axum_server::bind(addr)
                    .handle(self.handle)
                    .serve(app)
                    .await?;
            }
        }

        tracing::info!(address = %addr, "Listener stopped");
        Ok(())
    }

    /// Once a stop is requested, wait for in-flight requests and then close
    /// the listener and its idle connections.
    async fn close_when_drained(&self) {
        let deadline = self.drain.stop_requested().await;
        let started = Instant::now();
        tracing::debug!(in_flight = self.drain.in_flight(), deadline = ?deadline, "Draining listener");

        if self.drain.wait_idle(deadline).await {
            self.handle
                .graceful_shutdown(Some(deadline.saturating_sub(started.elapsed())));
        } else {
            tracing::warn!(
                in_flight = self.drain.in_flight(),
                deadline = ?deadline,
                "Drain deadline passed, closing open connections"
            );
            self.handle.shutdown();
        }
    }
}
