//! Typed request extractors for the resolved identity.
//!
//! Handlers should read the client address through [`ClientAddr`] rather
//! than `ConnectInfo`, so trusted proxy resolution applies everywhere.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, StatusCode},
};

use crate::net::ListenerInfo;
use crate::security::ForwardedIdentity;

/// Effective client IP address for the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr(pub IpAddr);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .extensions
            .get::<ForwardedIdentity>()
            .and_then(|identity| identity.client_address);
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        forwarded
            .or(peer)
            .map(ClientAddr)
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "Client address unavailable"))
    }
}

impl<S> FromRequestParts<S> for ForwardedIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<ForwardedIdentity>().cloned().unwrap_or_default())
    }
}

impl<S> FromRequestParts<S> for ListenerInfo
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ListenerInfo>()
            .cloned()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "Listener information unavailable"))
    }
}
