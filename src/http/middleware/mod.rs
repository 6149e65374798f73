//! Request middleware.

pub mod drain;
pub mod forwarded;

pub use drain::{drain_middleware, RequestDrain};
pub use forwarded::{forwarded_identity_middleware, ListenerContext};
