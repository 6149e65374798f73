//! Trusted proxy networks.
//!
//! A [`TrustBoundary`] is the set of peer networks that are allowed to assert
//! forwarding headers on behalf of a client. It is built once per listener and
//! shared read-only across all requests on that listener.

use std::net::IpAddr;

use ipnet::IpNet;
use tracing::Span;

/// Error type for trust boundary construction.
#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    /// A configured entry is not valid CIDR notation.
    #[error("invalid trusted proxy network {cidr:?}: {source}")]
    InvalidNetwork {
        cidr: String,
        #[source]
        source: ipnet::AddrParseError,
    },
}

/// An immutable set of trusted proxy networks.
#[derive(Debug, Clone)]
pub struct TrustBoundary {
    networks: Vec<IpNet>,
    span: Span,
}

impl TrustBoundary {
    /// Parse every CIDR entry. The first malformed entry aborts construction.
    pub fn build<I, S>(cidrs: I, span: Span) -> Result<Self, TrustError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let networks = cidrs
            .into_iter()
            .map(|cidr| {
                let cidr = cidr.as_ref().trim();
                cidr.parse::<IpNet>()
                    .map(|net| net.trunc())
                    .map_err(|source| TrustError::InvalidNetwork {
                        cidr: cidr.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(parent: &span, networks = networks.len(), "Trust boundary built");

        Ok(Self { networks, span })
    }

    /// A boundary that trusts no peer at all.
    pub fn empty(span: Span) -> Self {
        Self {
            networks: Vec::new(),
            span,
        }
    }

    /// Returns true if `ip` falls inside at least one trusted network.
    pub fn contains(&self, ip: IpAddr) -> bool {
        // Dual-stack sockets report IPv4 peers as ::ffff:a.b.c.d.
        let ip = ip.to_canonical();
        self.networks.iter().any(|net| net.contains(&ip))
    }

    /// Like [`contains`](Self::contains) but takes the address in string
    /// form, with or without a `:port` suffix. Unparseable input is never
    /// trusted.
    pub fn contains_address_str(&self, addr: &str) -> bool {
        match parse_ip(remove_port(addr)) {
            Some(ip) => self.contains(ip),
            None => {
                tracing::warn!(parent: &self.span, address = %addr, "Failed to parse peer address as an IP");
                false
            }
        }
    }

    /// Number of trusted networks.
    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn networks(&self) -> &[IpNet] {
        &self.networks
    }
}

/// Strip a trailing `:port` from `s`.
///
/// Bracketed IPv6 literals keep their brackets (`[::1]:80` becomes `[::1]`).
/// The rest of the string is not validated.
pub fn remove_port(s: &str) -> &str {
    for (idx, b) in s.bytes().enumerate().rev() {
        match b {
            b':' => return &s[..idx],
            b']' => return s,
            _ => {}
        }
    }
    s
}

/// Parse an IP address that may be enclosed in `[` `]`.
pub fn parse_ip(s: &str) -> Option<IpAddr> {
    let s = s.trim();
    let s = s
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(s);
    s.parse().ok()
}
