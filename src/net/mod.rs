//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Address string
//!     → address.rs (TCP endpoint or Unix path, decided once)
//!     → listener.rs (stale-path cleanup, bind, accept loop primitives)
//!     → peer.rs (real peer for TCP, synthetic peer for Unix)
//!     → tls.rs (optional handshake, TCP only)
//!     → connection.rs (stream abstraction, in-flight tracking)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - TCP and Unix are variants of one enum, never runtime-patched behaviour
//! - A path that exists but is not a socket is never unlinked
//! - Unix listeners remove their socket file when dropped

pub mod address;
pub mod connection;
pub mod listener;
pub mod peer;
pub mod tls;

pub use address::{resolve, Address, AddressFamily};
pub use listener::{AcceptError, BindError, BoundAddr, Listener};
pub use peer::{PeerAddr, SYNTHETIC_HOST, SYNTHETIC_PORT};
