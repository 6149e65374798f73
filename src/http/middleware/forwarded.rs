//! Forwarded identity middleware.
//! Resolves the client identity for every request on a listener.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::net::ListenerInfo;
use crate::security::ProxyHeaderResolver;

/// Per-listener state for the identity middleware.
#[derive(Clone)]
pub struct ListenerContext {
    pub resolver: Arc<ProxyHeaderResolver>,
    pub info: ListenerInfo,
}

pub async fn forwarded_identity_middleware(
    State(ctx): State<ListenerContext>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let identity = ctx.resolver.resolve(peer, req.headers());

    if !identity.is_empty() {
        tracing::debug!(
            listener = %ctx.info,
            peer = ?peer,
            client = ?identity.client_address,
            proto = ?identity.protocol,
            host = ?identity.host,
            "Resolved forwarded identity"
        );
    }

    req.extensions_mut().insert(identity);
    req.extensions_mut().insert(ctx.info.clone());
    next.run(req).await
}
