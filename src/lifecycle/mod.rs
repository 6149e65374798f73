//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → per-listener trust boundary + resolver → ServerRuntime
//!
//! Run (runtime.rs):
//!     Spawn one task per listener → join outcomes → first failure stops all
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → ServerRuntime::shutdown(deadline)
//! ```
//!
//! # Design Decisions
//! - All listeners start concurrently, no ordering between them
//! - All-or-nothing: one failing listener brings the others down
//! - Shutdown has a deadline; stragglers finish in the background

pub mod runtime;
pub mod signals;
pub mod startup;

pub use runtime::{RuntimeError, RuntimeOptions, RuntimeState, ServerRuntime};
pub use signals::shutdown_signal;
pub use startup::build_runtime;
