//! Server lifecycle for hosting a recording endpoint
//!
//! Owns the HTTP listener only; the capture core never touches it. Tests
//! bind a handle, fire requests, and rely on RAII to stop the listener on
//! every exit path.

mod lifecycle;
mod limiter;

pub use lifecycle::{start, ServerHandle, ServerOptions};
pub use limiter::{ConnectionGuard, ConnectionLimiter};

/// Maximum number of concurrent connections
pub const MAX_CONNECTIONS: usize = 256;
