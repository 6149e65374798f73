//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ListenerSpec
//!     → listener.rs (resolve bind address, listener identity)
//!     → tls.rs (optional certificate loading)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - TLS vs plain is fixed per listener at construction
//! - TLS material is loaded when the listener starts, so a bad path fails
//!   that listener only

pub mod listener;
pub mod tls;

pub use listener::{resolve_bind_addr, ListenerInfo};
