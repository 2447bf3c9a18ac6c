//! Development HTTP server over TCP or Unix domain sockets.
//!
//! # Architecture Overview
//!
//! ```text
//!     address string
//!         │
//!         ▼
//!   ┌───────────┐    ┌────────────┐    ┌──────────┐    ┌────────────┐
//!   │    net    │───▶│    net     │───▶│   http   │───▶│ middleware │───▶ application
//!   │  address  │    │  listener  │    │  server  │    │ debugger + │
//!   └───────────┘    │ + peer shim│    │ + handler│    │   static   │
//!                    └────────────┘    └──────────┘    └────────────┘
//!
//!   lifecycle::run ── banner, signals, serve ──┐
//!        │                                     │
//!        └── reload: probe → supervisor ─▶ child process ─▶ watcher
//! ```
//!
//! The entry point is [`run_simple`]. [`Server`] can also be driven directly.

// Core subsystems
pub mod app;
pub mod config;
pub mod http;
pub mod net;

// Application wrappers
pub mod middleware;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod reload;

pub mod demo;

pub use app::{body, Application, Body, BoxError, Environ, SharedApp, StartResponse};
pub use config::schema::DevServerConfig;
pub use error::ServeError;
pub use http::Server;
pub use lifecycle::{run_simple, Shutdown};
pub use net::{resolve, Address, AddressFamily, PeerAddr};
