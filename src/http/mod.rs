//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted stream + PeerAddr
//!     → server.rs (accept loop, concurrency mode, shutdown)
//!     → handler.rs (TLS handshake, hyper HTTP/1.1 connection)
//!     → request.rs (buffer body, build environ, request ID)
//!     → application on the blocking pool
//!     → response.rs (assemble response, error pages)
//!     → Send to client
//! ```

pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::Server;
