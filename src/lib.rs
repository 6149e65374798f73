//! Trusted edge: multi-listener HTTP runtime with trust-gated proxy headers.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;

pub use config::ServiceConfig;
pub use lifecycle::{RuntimeError, ServerRuntime};
pub use security::{ForwardedIdentity, ProxyHeaderResolver, TrustBoundary};
