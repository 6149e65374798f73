//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → trust.rs (is the connected peer a trusted proxy?)
//!     → headers.rs (if so, resolve X-Forwarded-* / Forwarded)
//!     → ForwardedIdentity attached to the request
//! ```
//!
//! # Design Decisions
//! - Fail closed: no trust configuration means forwarding headers are ignored
//! - No trust in client input: malformed tokens are dropped, never guessed
//! - Trust boundaries are immutable and shared without locking

pub mod headers;
pub mod trust;

pub use headers::{resolve_client_address, ForwardedIdentity, ProxyHeaderResolver};
pub use trust::{TrustBoundary, TrustError};
