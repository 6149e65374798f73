//! Forwarding header resolution.
//!
//! # Responsibilities
//! - Decide whether the connected peer may assert forwarding headers
//! - Extract client address, protocol and host from `X-Real-IP`,
//!   `X-Forwarded-For`, `X-Forwarded-Proto`, `X-Forwarded-Host` and
//!   RFC 7239 `Forwarded`
//! - Provide the single accessor for the effective client address
//!
//! # Design Decisions
//! - Fail closed: headers from an untrusted peer are never read
//! - Malformed tokens are logged and skipped, never fatal
//! - Headers are applied in a fixed order and the later header wins, so
//!   `Forwarded` overrides `X-Forwarded-*`, which overrides `X-Real-IP`
//! - Within `Forwarded`, only the first well-formed `for=` is used

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::http::header::{HeaderMap, HeaderName, FORWARDED};
use serde::Serialize;
use tracing::Span;

use crate::security::trust::{parse_ip, remove_port, TrustBoundary};

pub static X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");
pub static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub static X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub static X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// Client identity asserted by a trusted proxy.
///
/// Every field is `None` when the peer is not trusted or sent nothing usable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForwardedIdentity {
    pub client_address: Option<IpAddr>,
    pub protocol: Option<String>,
    pub host: Option<String>,
}

impl ForwardedIdentity {
    pub fn is_empty(&self) -> bool {
        self.client_address.is_none() && self.protocol.is_none() && self.host.is_none()
    }

    /// The effective client IP: the forwarded address if one was resolved,
    /// otherwise the socket peer.
    pub fn client_ip(&self, peer: SocketAddr) -> IpAddr {
        self.client_address.unwrap_or_else(|| peer.ip())
    }
}

/// Effective client address for a raw `host:port` peer string.
///
/// Returns `None` only if no forwarded address is set and `peer` is not a
/// parseable IP either.
pub fn resolve_client_address(identity: &ForwardedIdentity, peer: &str) -> Option<IpAddr> {
    identity
        .client_address
        .or_else(|| parse_ip(remove_port(peer)))
}

/// A malformed header token. Never leaves this module.
#[derive(Debug, thiserror::Error)]
enum HeaderParseError {
    #[error("{value:?} is not a valid IP address")]
    InvalidAddress { value: String },

    #[error("expected key=value, got {pair:?}")]
    MalformedPair { pair: String },

    #[error("header value is not valid UTF-8")]
    NonUtf8,
}

/// Resolves [`ForwardedIdentity`] for one listener.
#[derive(Debug)]
pub struct ProxyHeaderResolver {
    boundary: Arc<TrustBoundary>,
    span: Span,
}

impl ProxyHeaderResolver {
    pub fn new(boundary: Arc<TrustBoundary>, span: Span) -> Self {
        Self { boundary, span }
    }

    pub fn boundary(&self) -> &TrustBoundary {
        &self.boundary
    }

    /// Resolve the identity for a request from `peer`.
    ///
    /// An unknown peer is treated like an untrusted one.
    pub fn resolve(&self, peer: Option<SocketAddr>, headers: &HeaderMap) -> ForwardedIdentity {
        match peer {
            Some(peer) if self.boundary.contains(peer.ip()) => self.read_headers(headers),
            _ => ForwardedIdentity::default(),
        }
    }

    /// Same as [`resolve`](Self::resolve) for a raw `host:port` peer string.
    pub fn resolve_peer_str(&self, peer: &str, headers: &HeaderMap) -> ForwardedIdentity {
        if self.boundary.contains_address_str(peer) {
            self.read_headers(headers)
        } else {
            ForwardedIdentity::default()
        }
    }

    fn read_headers(&self, headers: &HeaderMap) -> ForwardedIdentity {
        let mut identity = ForwardedIdentity::default();

        if let Some(value) = self.header_str(headers, &X_REAL_IP) {
            match parse_ip_token(value) {
                Ok(ip) => identity.client_address = Some(ip),
                Err(err) => self.skip(&X_REAL_IP, &err),
            }
        }

        if let Some(value) = self.header_str(headers, &X_FORWARDED_FOR) {
            // Left-most entry is the originating client.
            let first = value.split(',').next().unwrap_or_default();
            match parse_ip_token(first) {
                Ok(ip) => identity.client_address = Some(ip),
                Err(err) => self.skip(&X_FORWARDED_FOR, &err),
            }
        }

        if let Some(value) = self.header_str(headers, &X_FORWARDED_PROTO) {
            identity.protocol = Some(value.to_string());
        }

        if let Some(value) = self.header_str(headers, &X_FORWARDED_HOST) {
            identity.host = Some(value.to_string());
        }

        self.read_forwarded(headers, &mut identity);

        identity
    }

    /// RFC 7239 `Forwarded`, across every occurrence of the header.
    fn read_forwarded(&self, headers: &HeaderMap, identity: &mut ForwardedIdentity) {
        let mut hop_seen = false;

        for raw in headers.get_all(&FORWARDED) {
            let Ok(value) = raw.to_str() else {
                self.skip(&FORWARDED, &HeaderParseError::NonUtf8);
                continue;
            };

            for element in value.split(';').flat_map(|pairs| pairs.split(',')) {
                let element = element.trim();
                if element.is_empty() {
                    continue;
                }

                let Some((key, val)) = element.split_once('=') else {
                    self.skip(
                        &FORWARDED,
                        &HeaderParseError::MalformedPair { pair: element.to_string() },
                    );
                    continue;
                };
                let val = unquote(val.trim());

                match key.trim().to_ascii_lowercase().as_str() {
                    "for" => match parse_ip_token(remove_port(val)) {
                        Ok(ip) if !hop_seen => {
                            identity.client_address = Some(ip);
                            hop_seen = true;
                        }
                        Ok(ip) => {
                            tracing::debug!(parent: &self.span, address = %ip, "Ignoring additional Forwarded for= hop");
                        }
                        Err(err) => self.skip(&FORWARDED, &err),
                    },
                    "proto" => identity.protocol = Some(val.to_string()),
                    "host" => identity.host = Some(val.to_string()),
                    "by" => {}
                    other => {
                        tracing::debug!(parent: &self.span, parameter = %other, "Ignoring unknown Forwarded parameter");
                    }
                }
            }
        }
    }

    /// First non-empty value of `name`.
    fn header_str<'a>(&self, headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
        let raw = headers.get(name)?;
        match raw.to_str() {
            Ok(value) if !value.trim().is_empty() => Some(value),
            Ok(_) => None,
            Err(_) => {
                self.skip(name, &HeaderParseError::NonUtf8);
                None
            }
        }
    }

    fn skip(&self, header: &HeaderName, err: &HeaderParseError) {
        tracing::warn!(parent: &self.span, header = %header, error = %err, "Skipping malformed proxy header token");
    }
}

fn parse_ip_token(token: &str) -> Result<IpAddr, HeaderParseError> {
    parse_ip(token).ok_or_else(|| HeaderParseError::InvalidAddress {
        value: token.trim().to_string(),
    })
}

/// Strip one pair of surrounding double quotes (RFC 7239 quoted-string).
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(value)
}
