//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn a validated configuration into a ready server runtime
//! - Fall back to the development listener when none is configured
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners are prepared here but only bound by `ServerRuntime::run`

use axum::Router;
use tracing::Span;

use crate::config::ServiceConfig;
use crate::lifecycle::runtime::{RuntimeError, RuntimeOptions, ServerRuntime};

/// Build the runtime described by `config` in front of `app`.
pub fn build_runtime(config: &ServiceConfig, app: Router, span: Span) -> Result<ServerRuntime, RuntimeError> {
    let options = RuntimeOptions {
        shutdown_timeout: config.shutdown.timeout(),
        invalid_trust_policy: config.trust.on_invalid,
    };

    let listeners = config.listeners_or_default();
    for listener in &listeners {
        tracing::info!(
            parent: &span,
            address = %listener.address,
            tls = listener.is_tls(),
            trusted_proxies = listener.trusted_proxies.len(),
            "Listener configured"
        );
    }

    ServerRuntime::new(listeners, app, options, span)
}
