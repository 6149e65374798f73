//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events under their injected span
//!     → per-request spans from tower-http's TraceLayer
//!
//! Consumers:
//!     → logging.rs (fmt subscriber on stdout)
//! ```
//!
//! # Design Decisions
//! - Structured fields, not formatted strings
//! - Request ID flows through every request span

pub mod logging;

pub use logging::{init_logging, LogFilter};
