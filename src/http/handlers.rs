//! Built-in application routes.

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::http::extract::ClientAddr;
use crate::net::ListenerInfo;
use crate::security::ForwardedIdentity;

#[derive(Serialize)]
pub struct IdentityReport {
    pub client_address: String,
    pub forwarded: ForwardedIdentity,
    pub listener: ListenerInfo,
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub version: &'static str,
    pub status: &'static str,
}

/// Default application router used by the binary.
pub fn default_app() -> Router {
    Router::new()
        .route("/", get(whoami))
        .route("/health", get(health))
}

/// Report the resolved client identity and the accepting listener.
pub async fn whoami(
    ClientAddr(client): ClientAddr,
    listener: ListenerInfo,
    forwarded: ForwardedIdentity,
) -> Json<IdentityReport> {
    Json(IdentityReport {
        client_address: client.to_string(),
        forwarded,
        listener,
    })
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}
