//! Listener identity and bind address resolution.
//!
//! # Responsibilities
//! - Describe which listener accepted a connection
//! - Resolve configured `host:port` strings to socket addresses

use std::io;
use std::net::SocketAddr;

use serde::Serialize;

use crate::config::ListenerSpec;

/// Identity of the listener that accepted a connection.
///
/// Attached to every request so handlers can tell listeners apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerInfo {
    /// Position of the listener in the runtime's listener list.
    pub index: usize,
    /// Configured bind address.
    pub address: String,
    /// Whether the listener terminates TLS.
    pub tls: bool,
}

impl ListenerInfo {
    pub fn new(index: usize, spec: &ListenerSpec) -> Self {
        Self {
            index,
            address: spec.address.clone(),
            tls: spec.is_tls(),
        }
    }

    pub fn scheme(&self) -> &'static str {
        if self.tls {
            "https"
        } else {
            "http"
        }
    }
}

impl std::fmt::Display for ListenerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.scheme(), self.address)
    }
}

/// Resolve a bind address to the first matching socket address.
///
/// An empty host (`:8080`) binds all IPv4 interfaces.
pub async fn resolve_bind_addr(address: &str) -> io::Result<SocketAddr> {
    let address = address.trim();
    let address = if address.starts_with(':') {
        format!("0.0.0.0{address}")
    } else {
        address.to_string()
    };

    let resolved = tokio::net::lookup_host(address.as_str()).await?.next();
    resolved.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no address found for {address}"),
        )
    })
}
