//! Multi-listener server runtime.
//!
//! Owns every listener task. `run` starts them all concurrently and blocks
//! until they end; `shutdown` stops them all, bounded by a deadline.
//!
//! ```text
//! Idle → Starting → Running → ShuttingDown → Stopped
//!            └──────────┴───────────┴──────→ Failed
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::watch;
use tokio_util::task::TaskTracker;
use tracing::Span;

use crate::config::{InvalidTrustPolicy, ListenerSpec};
use crate::http::server::ListenerServer;
use crate::net::ListenerInfo;
use crate::security::{ProxyHeaderResolver, TrustBoundary, TrustError};

/// Lifecycle state of a [`ServerRuntime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Idle,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
    Failed,
}

impl RuntimeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RuntimeState::Stopped | RuntimeState::Failed)
    }
}

impl std::fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RuntimeState::Idle => "idle",
            RuntimeState::Starting => "starting",
            RuntimeState::Running => "running",
            RuntimeState::ShuttingDown => "shutting down",
            RuntimeState::Stopped => "stopped",
            RuntimeState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Error type for runtime operations.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// `run` was called without any listener.
    #[error("no listeners configured")]
    NoListeners,

    /// A listener failed to bind, load its TLS material, or serve.
    #[error("listener {address} failed: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// A listener task panicked or was cancelled.
    #[error("listener task failed: {0}")]
    ListenerTask(#[from] tokio::task::JoinError),

    /// Listeners were still draining when the deadline expired.
    #[error("graceful shutdown did not complete within {deadline:?}")]
    ShutdownTimeout { deadline: Duration },

    /// `run` was called on a runtime that is not idle.
    #[error("runtime cannot start while {state}")]
    AlreadyStarted { state: RuntimeState },

    /// Malformed trusted proxy list under [`InvalidTrustPolicy::Abort`].
    #[error("listener {address}: {source}")]
    InvalidNetwork {
        address: String,
        #[source]
        source: TrustError,
    },
}

/// Runtime tuning.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Drain deadline used when the runtime stops itself after a listener
    /// failure.
    pub shutdown_timeout: Duration,
    /// Reaction to malformed trusted proxy entries.
    pub invalid_trust_policy: InvalidTrustPolicy,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
            invalid_trust_policy: InvalidTrustPolicy::Distrust,
        }
    }
}

/// Runs N independent listeners with all-or-nothing shutdown.
pub struct ServerRuntime {
    servers: Vec<ListenerServer>,
    tracker: TaskTracker,
    state: watch::Sender<RuntimeState>,
    shutdown_timeout: Duration,
    span: Span,
}

impl ServerRuntime {
    /// Prepare one server per listener in front of the shared `app`.
    ///
    /// Each listener gets its own trust boundary and resolver. All
    /// diagnostics are emitted under `span`.
    pub fn new(
        listeners: Vec<ListenerSpec>,
        app: Router,
        options: RuntimeOptions,
        span: Span,
    ) -> Result<Self, RuntimeError> {
        let mut servers = Vec::with_capacity(listeners.len());

        for (index, spec) in listeners.into_iter().enumerate() {
            let listener_span = tracing::info_span!(
                parent: &span,
                "listener",
                index,
                address = %spec.address,
                tls = spec.is_tls()
            );

            let boundary = match TrustBoundary::build(&spec.trusted_proxies, listener_span.clone()) {
                Ok(boundary) => boundary,
                Err(source) => match options.invalid_trust_policy {
                    InvalidTrustPolicy::Abort => {
                        return Err(RuntimeError::InvalidNetwork {
                            address: spec.address.clone(),
                            source,
                        });
                    }
                    InvalidTrustPolicy::Distrust => {
                        tracing::error!(
                            parent: &listener_span,
                            error = %source,
                            "Invalid trusted proxies, forwarding headers will be ignored on this listener"
                        );
                        TrustBoundary::empty(listener_span.clone())
                    }
                },
            };

            let resolver = Arc::new(ProxyHeaderResolver::new(Arc::new(boundary), listener_span.clone()));
            servers.push(ListenerServer::new(index, spec, resolver, app.clone(), listener_span));
        }

        let (state, _) = watch::channel(RuntimeState::Idle);

        Ok(Self {
            servers,
            tracker: TaskTracker::new(),
            state,
            shutdown_timeout: options.shutdown_timeout,
            span,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RuntimeState {
        *self.state.borrow()
    }

    /// Observe lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<RuntimeState> {
        self.state.subscribe()
    }

    /// Identity of every configured listener, in configuration order.
    pub fn listeners(&self) -> impl Iterator<Item = &ListenerInfo> {
        self.servers.iter().map(ListenerServer::info)
    }

    /// Requests currently being handled, across all listeners.
    pub fn in_flight(&self) -> usize {
        self.servers.iter().map(ListenerServer::in_flight).sum()
    }

    /// Wait until listener `index` is bound and return its local address.
    ///
    /// Returns `None` for an unknown index or a listener that failed to
    /// bind. A listener whose TLS material fails to load never binds, so
    /// callers should bound this wait.
    pub async fn listening(&self, index: usize) -> Option<SocketAddr> {
        self.servers.get(index)?.listening().await
    }

    /// Start every listener and block until all of them have stopped.
    ///
    /// Returns `Ok(())` if every listener stopped because of a shutdown
    /// request. The first listener failure stops all other listeners and
    /// is returned once they are down.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        if self.servers.is_empty() {
            tracing::error!(parent: &self.span, "Refusing to start without listeners");
            return Err(RuntimeError::NoListeners);
        }

        if !self.transition(&[RuntimeState::Idle], RuntimeState::Starting) {
            return Err(RuntimeError::AlreadyStarted { state: self.state() });
        }

        tracing::info!(parent: &self.span, listeners = self.servers.len(), "Starting listeners");

        let mut tasks = FuturesUnordered::new();
        for server in &self.servers {
            let address = server.info().address.clone();
            let handle = self.tracker.spawn(server.clone().serve());
            tasks.push(async move { (address, handle.await) });
        }
        self.tracker.close();
        self.transition(&[RuntimeState::Starting], RuntimeState::Running);

        let mut first_error = None;
        while let Some((address, joined)) = tasks.next().await {
            let outcome = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(source)) => RuntimeError::Bind { address, source },
                Err(join_error) => RuntimeError::ListenerTask(join_error),
            };

            if first_error.is_none() {
                tracing::error!(parent: &self.span, error = %outcome, "Listener failed, stopping all listeners");
                self.stop_all(self.shutdown_timeout);
                first_error = Some(outcome);
            } else {
                tracing::warn!(parent: &self.span, error = %outcome, "Additional listener failure during shutdown");
            }
        }

        match first_error {
            Some(err) => {
                self.state.send_replace(RuntimeState::Failed);
                Err(err)
            }
            None => {
                self.transition(
                    &[RuntimeState::Running, RuntimeState::ShuttingDown],
                    RuntimeState::Stopped,
                );
                tracing::info!(parent: &self.span, "All listeners stopped");
                Ok(())
            }
        }
    }

    /// Gracefully stop every listener, waiting at most `deadline`.
    ///
    /// Listeners that are still draining when the deadline passes keep
    /// shutting down in the background. Calling this on a stopped runtime
    /// is a no-op.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), RuntimeError> {
        match self.state() {
            RuntimeState::Stopped | RuntimeState::Failed => return Ok(()),
            RuntimeState::Idle => {
                if self.transition(&[RuntimeState::Idle], RuntimeState::Stopped) {
                    self.tracker.close();
                    tracing::debug!(parent: &self.span, "Runtime stopped before it was started");
                    return Ok(());
                }
            }
            _ => {}
        }

        tracing::info!(parent: &self.span, deadline = ?deadline, "Graceful shutdown requested");
        self.stop_all(deadline);

        match tokio::time::timeout(deadline, self.tracker.wait()).await {
            Ok(()) => {
                self.transition(&[RuntimeState::ShuttingDown], RuntimeState::Stopped);
                Ok(())
            }
            Err(_) => {
                tracing::warn!(
                    parent: &self.span,
                    deadline = ?deadline,
                    remaining = self.tracker.len(),
                    in_flight = self.in_flight(),
                    "Graceful shutdown timed out"
                );
                Err(RuntimeError::ShutdownTimeout { deadline })
            }
        }
    }

    /// Fan out a graceful stop to every listener.
    fn stop_all(&self, deadline: Duration) {
        self.transition(
            &[RuntimeState::Starting, RuntimeState::Running],
            RuntimeState::ShuttingDown,
        );
        for server in &self.servers {
            server.stop(deadline);
        }
    }

    /// Move to `to` if the current state is one of `from`.
    fn transition(&self, from: &[RuntimeState], to: RuntimeState) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if from.contains(state) {
                *state = to;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::debug!(parent: &self.span, state = %to, "Runtime state changed");
        }
        changed
    }
}
