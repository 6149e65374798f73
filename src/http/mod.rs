//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (axum-server setup per listener)
//!     → request ID + trace span
//!     → middleware/forwarded.rs (resolve ForwardedIdentity, attach ListenerInfo)
//!     → extract.rs (typed accessors for handlers)
//!     → application router
//! ```

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use extract::ClientAddr;
pub use handlers::default_app;
pub use server::ListenerServer;
