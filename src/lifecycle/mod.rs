//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Run loop (run.rs):
//!     Resolve address → Wrap middleware → Banner (main process only)
//!     → reload off: bind → serve until signal
//!     → reload on, main: bind probe → supervise children
//!     → reload on, child: watch files → bind → serve until change or signal
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Unlink socket → Drain connections → Return
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Bind errors surface before any child process is spawned
//! - Ordered shutdown: stop accept, close listener, drain
//! - Shutdown is a watch flag, so late subscribers never miss it

pub mod run;
pub mod shutdown;
pub mod signals;

pub use run::run_simple;
pub use shutdown::Shutdown;
